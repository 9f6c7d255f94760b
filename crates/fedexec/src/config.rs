//! Execution settings and plan documents.
//!
//! A plan document is a JSON description of tables, the sources reading
//! them, and the queries to run. Building a plan produces a frozen
//! `SourceRegistry` and a `QueryBatch` ready for execution.
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{FedError, Result, config_err};
use crate::plan::{JoinKind, JoinStep, ProjectionEntry, QueryBatch, QuerySpec};
use crate::source::{SourceEntry, SourceRegistry};
use crate::table::{Row, Table, Value};
use crate::transform::{
    DEFAULT_ID_COLUMN, FilterEq, Identity, PrefixId, Rename, SelectColumns, TransformRef,
};

/// What to do when a query in a batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Abort the batch on the first error.
    #[default]
    AllOrNothing,
    /// Record the error for the failing query name and continue with the
    /// rest.
    PerQuery,
}

impl FromStr for FailureMode {
    type Err = FedError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all_or_nothing" | "all-or-nothing" => Ok(FailureMode::AllOrNothing),
            "per_query" | "per-query" => Ok(FailureMode::PerQuery),
            other => Err(config_err!("invalid failure mode '{other}'")),
        }
    }
}

/// Configuration for batch execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    pub failure_mode: FailureMode,
    /// Execute the shards of a single query in parallel.
    ///
    /// Results are still unioned in declared shard order.
    pub parallel_shards: bool,
}

impl ExecutionConfig {
    /// Set a single setting by name.
    pub fn set_from_str(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "failure_mode" => self.failure_mode = value.parse()?,
            "parallel_shards" => {
                self.parallel_shards = value
                    .parse()
                    .map_err(|_| config_err!("invalid bool for '{name}': {value}"))?
            }
            other => return Err(config_err!("missing setting for '{other}'")),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum TransformConfig {
    Identity,
    PrefixId {
        prefix: String,
        column: String,
        #[serde(default = "default_id_column")]
        target: String,
    },
    Select {
        columns: Vec<String>,
    },
    FilterEq {
        column: String,
        value: Value,
    },
    Rename {
        columns: IndexMap<String, String>,
    },
}

fn default_id_column() -> String {
    DEFAULT_ID_COLUMN.to_string()
}

impl TransformConfig {
    pub fn build(&self) -> TransformRef {
        match self {
            Self::Identity => Arc::new(Identity),
            Self::PrefixId {
                prefix,
                column,
                target,
            } => Arc::new(PrefixId::new(prefix, column).with_target(target)),
            Self::Select { columns } => Arc::new(SelectColumns {
                columns: columns.clone(),
            }),
            Self::FilterEq { column, value } => Arc::new(FilterEq {
                column: column.clone(),
                value: value.clone(),
            }),
            Self::Rename { columns } => Arc::new(Rename {
                columns: columns
                    .iter()
                    .map(|(from, to)| (from.clone(), to.clone()))
                    .collect(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Name of the table in the document's `tables` section.
    pub table: String,
    #[serde(default)]
    pub normalize: Option<TransformConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinConfig {
    /// Name of the mapping table in the document's `tables` section.
    pub mapping: String,
    pub left_on: Vec<String>,
    pub right_on: Vec<String>,
    #[serde(default)]
    pub kind: JoinKind,
}

/// A projection entry, either a bare column name or a source/target pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProjectionConfig {
    Column(String),
    Alias(AliasConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AliasConfig {
    pub source: String,
    /// Defaults to the unqualified source column name.
    #[serde(default)]
    pub target: Option<String>,
}

impl From<&ProjectionConfig> for ProjectionEntry {
    fn from(value: &ProjectionConfig) -> Self {
        match value {
            ProjectionConfig::Column(source)
            | ProjectionConfig::Alias(AliasConfig {
                source,
                target: None,
            }) => ProjectionEntry::column(source),
            ProjectionConfig::Alias(AliasConfig {
                source,
                target: Some(target),
            }) => ProjectionEntry::new(source, target),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    pub source: String,
    #[serde(default)]
    pub sub_query: Option<TransformConfig>,
    #[serde(default)]
    pub joins: Vec<JoinConfig>,
    pub projection: Vec<ProjectionConfig>,
}

/// Top level plan document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlanDocument {
    pub settings: ExecutionConfig,
    pub tables: IndexMap<String, TableConfig>,
    pub sources: IndexMap<String, SourceConfig>,
    pub queries: IndexMap<String, Vec<QueryConfig>>,
}

/// A plan ready to execute.
#[derive(Debug)]
pub struct Plan {
    pub settings: ExecutionConfig,
    pub registry: SourceRegistry,
    pub batch: QueryBatch,
}

impl PlanDocument {
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "reading plan document");
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Build the registry and query batch described by this document.
    pub fn build(&self) -> Result<Plan> {
        let tables = self
            .tables
            .iter()
            .map(|(name, conf)| {
                let rows = conf.rows.iter().map(|vals| Row::new(vals.iter().cloned()));
                let table = Table::from_rows(conf.columns.iter().cloned(), rows)
                    .map_err(|e| config_err!("table '{name}': {e}"))?;
                Ok((name.as_str(), table))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        let get_table = |name: &str| {
            tables
                .get(name)
                .cloned()
                .ok_or_else(|| config_err!("missing table '{name}'"))
        };

        let mut registry = SourceRegistry::new();
        for (name, conf) in &self.sources {
            let mut entry = SourceEntry::new(name, get_table(&conf.table)?);
            if let Some(normalize) = &conf.normalize {
                entry = entry.with_normalize_ref(normalize.build());
            }
            registry = registry.with_source(entry)?;
        }

        let mut batch = QueryBatch::with_capacity(self.queries.len());
        for (name, shards) in &self.queries {
            let specs = shards
                .iter()
                .map(|conf| {
                    let mut spec = QuerySpec::new(&conf.source);
                    if let Some(sub_query) = &conf.sub_query {
                        spec = spec.with_sub_query_ref(sub_query.build());
                    }
                    for join in &conf.joins {
                        let mapping = get_table(&join.mapping)?.with_relation(&join.mapping);
                        spec = spec.with_join(
                            JoinStep::new(mapping, &join.left_on, &join.right_on)
                                .with_kind(join.kind),
                        );
                    }
                    Ok(spec.with_projection(conf.projection.iter().map(ProjectionEntry::from)))
                })
                .collect::<Result<Vec<_>>>()?;
            batch.insert(name.clone(), specs);
        }

        debug!(
            tables = tables.len(),
            sources = registry.len(),
            queries = batch.len(),
            "built plan"
        );

        Ok(Plan {
            settings: self.settings.clone(),
            registry,
            batch,
        })
    }
}
