use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use fedexec::{BatchResults, FailureMode, PlanDocument, Result, Table, execute_all};
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FailureModeArg {
    AllOrNothing,
    PerQuery,
}

impl From<FailureModeArg> for FailureMode {
    fn from(value: FailureModeArg) -> Self {
        match value {
            FailureModeArg::AllOrNothing => FailureMode::AllOrNothing,
            FailureModeArg::PerQuery => FailureMode::PerQuery,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Human,
    Json,
}

#[derive(Parser)]
#[clap(name = "fedexec")]
struct Arguments {
    /// Path to the JSON plan document.
    plan: PathBuf,

    /// Override the failure mode from the plan's settings.
    #[clap(long, value_enum)]
    failure_mode: Option<FailureModeArg>,

    /// Execute shards of each query in parallel.
    #[clap(long)]
    parallel: bool,

    /// Only execute these queries. May be repeated.
    #[clap(long = "query")]
    queries: Vec<String>,

    /// Default log level, `RUST_LOG` takes precedence.
    #[clap(long, default_value = "warn", env = "FEDEXEC_LOG_LEVEL")]
    log_level: tracing::Level,

    #[clap(long, value_enum, default_value = "human")]
    log_format: LogFormatArg,
}

/// Execute a plan document and write the results as JSON to stdout.
fn main() {
    let args = Arguments::parse();
    let format = match args.log_format {
        LogFormatArg::Human => logutil::LogFormat::HumanReadable,
        LogFormatArg::Json => logutil::LogFormat::Json,
    };
    logutil::configure_global_logger(args.log_level, format);

    if let Err(e) = inner(args) {
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }
}

fn inner(args: Arguments) -> Result<()> {
    let mut plan = PlanDocument::from_path(&args.plan)?.build()?;

    if let Some(mode) = args.failure_mode {
        plan.settings.failure_mode = mode.into();
    }
    if args.parallel {
        plan.settings.parallel_shards = true;
    }
    if !args.queries.is_empty() {
        if let Some(missing) = args.queries.iter().find(|q| !plan.batch.contains_key(*q)) {
            return Err(fedexec::FedError::Config(format!(
                "query '{missing}' not found in plan"
            )));
        }
        plan.batch.retain(|name, _| args.queries.contains(name));
    }

    info!(queries = plan.batch.len(), settings = ?plan.settings, "executing plan");
    let results = execute_all(&plan.registry, &plan.batch, &plan.settings)?;

    let output = results_to_json(&results)?;

    let mut stdout = BufWriter::new(std::io::stdout().lock());
    serde_json::to_writer_pretty(&mut stdout, &output)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

/// Render batch results, keeping batch order for query names and column
/// order within each row object.
fn results_to_json(results: &BatchResults) -> Result<serde_json::Value> {
    let tables: serde_json::Map<_, _> = results
        .tables
        .iter()
        .map(|(name, table)| -> Result<_> { Ok((name.clone(), table_to_json(table)?)) })
        .collect::<Result<_>>()?;
    let failures: serde_json::Map<_, _> = results
        .failures
        .iter()
        .map(|(name, e)| (name.clone(), serde_json::Value::String(e.to_string())))
        .collect();

    Ok(serde_json::json!({
        "results": tables,
        "failures": failures,
    }))
}

/// Convert a table into a list of objects keyed by column name.
fn table_to_json(table: &Table) -> Result<serde_json::Value> {
    let names = table.column_names();
    let rows = table
        .rows()
        .iter()
        .map(|row| -> Result<_> {
            let obj = names
                .iter()
                .zip(row.values.iter())
                .map(|(name, val)| -> Result<_> {
                    Ok((name.clone(), serde_json::to_value(val)?))
                })
                .collect::<Result<serde_json::Map<_, _>>>()?;
            Ok(serde_json::Value::Object(obj))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(serde_json::Value::Array(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO_PLAN: &str = include_str!("../../../demos/users_companies.json");

    fn keys(value: &serde_json::Value) -> Vec<&str> {
        value
            .as_object()
            .unwrap()
            .keys()
            .map(|k| k.as_str())
            .collect()
    }

    #[test]
    fn output_keeps_declared_order() {
        let plan = PlanDocument::from_json(DEMO_PLAN).unwrap().build().unwrap();
        let results = execute_all(&plan.registry, &plan.batch, &plan.settings).unwrap();
        let output = results_to_json(&results).unwrap();

        assert_eq!(vec!["results", "failures"], keys(&output));
        assert_eq!(vec!["managers", "thirty"], keys(&output["results"]));

        let managers = output["results"]["managers"].as_array().unwrap();
        assert_eq!(5, managers.len());
        for row in managers {
            assert_eq!(vec!["ID", "first_name", "company"], keys(row));
        }
        assert_eq!("live-1", managers[0]["ID"]);

        let text = serde_json::to_string(&managers[0]).unwrap();
        assert_eq!(
            r#"{"ID":"live-1","first_name":"Alice","company":"ACME Corp"}"#,
            text
        );
    }
}
