//! Federated execution of query batches.
//!
//! Every query name in a batch fans out over its shards, and the shard
//! outputs are unioned back together in declared shard order.
use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, debug_span, warn};

use crate::config::{ExecutionConfig, FailureMode};
use crate::errors::{FedError, Result};
use crate::executor::execute;
use crate::plan::{QueryBatch, QuerySpec};
use crate::source::SourceRegistry;
use crate::table::Table;

/// Output of executing a batch.
#[derive(Debug, Default)]
pub struct BatchResults {
    /// Unioned output per query name, in batch order.
    pub tables: IndexMap<String, Table>,
    /// Errors for query names that failed. Only populated when executing with
    /// `FailureMode::PerQuery`.
    pub failures: IndexMap<String, FedError>,
}

impl BatchResults {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Execute every query in the batch.
pub fn execute_all(
    registry: &SourceRegistry,
    batch: &QueryBatch,
    config: &ExecutionConfig,
) -> Result<BatchResults> {
    let mut results = BatchResults::default();

    for (name, shards) in batch {
        match execute_sharded(name, shards, registry, config) {
            Ok(table) => {
                results.tables.insert(name.clone(), table);
            }
            Err(e) => match config.failure_mode {
                FailureMode::AllOrNothing => return Err(e),
                FailureMode::PerQuery => {
                    warn!(query = %name, error = %e, "query failed");
                    results.failures.insert(name.clone(), e);
                }
            },
        }
    }

    Ok(results)
}

/// Execute all shards for a single query name and union the results.
pub fn execute_sharded(
    name: &str,
    shards: &[QuerySpec],
    registry: &SourceRegistry,
    config: &ExecutionConfig,
) -> Result<Table> {
    let _span = debug_span!("execute_sharded", query = %name, shards = shards.len()).entered();

    let tables = if config.parallel_shards {
        // Collecting an indexed parallel iterator keeps shard order.
        shards
            .par_iter()
            .map(|spec| execute(spec, registry))
            .collect::<Result<Vec<_>>>()?
    } else {
        shards
            .iter()
            .map(|spec| execute(spec, registry))
            .collect::<Result<Vec<_>>>()?
    };

    let out = union_shards(name, tables)?;
    debug!(rows = out.num_rows(), "unioned shards");

    Ok(out)
}

/// Union shard outputs in order, requiring identical schemas.
fn union_shards(name: &str, tables: Vec<Table>) -> Result<Table> {
    if let Some(first) = tables.first() {
        for (shard, table) in tables.iter().enumerate().skip(1) {
            if !first.schema().names().eq(table.schema().names()) {
                return Err(FedError::SchemaMismatch {
                    query: name.to_string(),
                    shard,
                    expected: first.schema().to_string(),
                    found: table.schema().to_string(),
                });
            }
        }
    }
    Table::concat(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{JoinStep, ProjectionEntry};
    use crate::row;
    use crate::source::SourceEntry;
    use crate::table::Value;
    use crate::transform::PrefixId;

    fn registry() -> SourceRegistry {
        let user = |id: i64, name: &str| {
            Table::from_rows(["id", "name"], [row![id, name]]).unwrap()
        };
        SourceRegistry::new()
            .with_source(SourceEntry::new("users_1", user(1, "Alice")))
            .unwrap()
            .with_source(SourceEntry::new("users_2", user(2, "Bob")))
            .unwrap()
            .with_source(SourceEntry::new("users_3", user(3, "Carol")))
            .unwrap()
            .with_source(SourceEntry::new(
                "accounts",
                Table::from_rows(["id", "email"], [row![1, "a@example.com"]]).unwrap(),
            ))
            .unwrap()
    }

    fn shard(source: &str) -> QuerySpec {
        QuerySpec::new(source)
            .with_projection([ProjectionEntry::column("id"), ProjectionEntry::column("name")])
    }

    fn three_shards() -> QueryBatch {
        let mut batch = QueryBatch::new();
        batch.insert(
            "users".to_string(),
            vec![shard("users_1"), shard("users_2"), shard("users_3")],
        );
        batch
    }

    #[test]
    fn union_in_shard_order() {
        logutil::init_test();

        let results =
            execute_all(&registry(), &three_shards(), &ExecutionConfig::default()).unwrap();
        assert!(results.is_complete());

        let users = &results.tables["users"];
        assert_eq!(vec!["id", "name"], users.column_names());
        assert_eq!(
            &[row![1, "Alice"], row![2, "Bob"], row![3, "Carol"]],
            users.rows()
        );
    }

    #[test]
    fn parallel_matches_sequential() {
        let sequential =
            execute_all(&registry(), &three_shards(), &ExecutionConfig::default()).unwrap();
        let parallel = execute_all(
            &registry(),
            &three_shards(),
            &ExecutionConfig {
                parallel_shards: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(sequential.tables, parallel.tables);
    }

    #[test]
    fn schema_mismatch() {
        let mut batch = QueryBatch::new();
        batch.insert(
            "users".to_string(),
            vec![
                shard("users_1"),
                // Same names in the same order, values come from a different
                // column.
                QuerySpec::new("accounts").with_projection([
                    ProjectionEntry::column("id"),
                    ProjectionEntry::new("email", "name"),
                ]),
                QuerySpec::new("users_3").with_projection([
                    ProjectionEntry::column("name"),
                    ProjectionEntry::column("id"),
                ]),
            ],
        );

        let err = execute_all(&registry(), &batch, &ExecutionConfig::default()).unwrap_err();
        match err {
            FedError::SchemaMismatch {
                query,
                shard,
                expected,
                found,
            } => {
                assert_eq!("users", query);
                assert_eq!(2, shard);
                assert_eq!("id, name", expected);
                assert_eq!("name, id", found);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    fn mixed_batch() -> QueryBatch {
        let mut batch = QueryBatch::new();
        batch.insert("broken".to_string(), vec![shard("users_1"), shard("missing")]);
        batch.insert("users".to_string(), vec![shard("users_2")]);
        batch
    }

    #[test]
    fn all_or_nothing_aborts() {
        let err =
            execute_all(&registry(), &mixed_batch(), &ExecutionConfig::default()).unwrap_err();
        assert!(matches!(err, FedError::UnknownSource { name } if name == "missing"));
    }

    #[test]
    fn per_query_continues() {
        let config = ExecutionConfig {
            failure_mode: FailureMode::PerQuery,
            ..Default::default()
        };
        let results = execute_all(&registry(), &mixed_batch(), &config).unwrap();

        assert!(!results.is_complete());
        assert!(matches!(
            results.failures["broken"],
            FedError::UnknownSource { .. }
        ));
        assert!(!results.tables.contains_key("broken"));
        assert_eq!(&[row![2, "Bob"]], results.tables["users"].rows());
    }

    #[test]
    fn no_shards_is_empty_table() {
        let mut batch = QueryBatch::new();
        batch.insert("nothing".to_string(), Vec::new());
        let results = execute_all(&registry(), &batch, &ExecutionConfig::default()).unwrap();
        let table = &results.tables["nothing"];
        assert_eq!(0, table.arity());
        assert_eq!(0, table.num_rows());
    }

    #[test]
    fn federated_ids_stay_distinct() {
        // Two sources share id values, prefixing keeps them apart before a
        // join against a mapping keyed on the synthesized id.
        let a = Table::from_rows(["id", "name"], [row![1, "Alice"]]).unwrap();
        let b = Table::from_rows(["id", "name"], [row![1, "Bob"]]).unwrap();
        let registry = SourceRegistry::new()
            .with_source(SourceEntry::new("crm", a).with_normalize(PrefixId::new("crm-", "id")))
            .unwrap()
            .with_source(SourceEntry::new("erp", b).with_normalize(PrefixId::new("erp-", "id")))
            .unwrap();

        let scores = Table::from_rows(["key", "score"], [row!["erp-1", 9]])
            .unwrap()
            .with_relation("scores");
        let spec = |source: &str| {
            QuerySpec::new(source)
                .with_join(JoinStep::new(scores.clone(), ["key"], ["ID"]))
                .with_projection([
                    ProjectionEntry::column("ID"),
                    ProjectionEntry::column("name"),
                    ProjectionEntry::column("score"),
                ])
        };

        let mut batch = QueryBatch::new();
        batch.insert("people".to_string(), vec![spec("crm"), spec("erp")]);

        let results = execute_all(&registry, &batch, &ExecutionConfig::default()).unwrap();
        assert_eq!(
            &[
                row!["crm-1", "Alice", Value::Null],
                row!["erp-1", "Bob", 9],
            ],
            results.tables["people"].rows()
        );
    }
}
