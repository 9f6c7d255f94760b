//! Declarative query execution over in-memory tables.
//!
//! # Queries
//!
//! A `QuerySpec` names a source, an optional sub query, an ordered list of
//! joins against mapping tables, and a final projection. Executing a spec
//! always runs the same steps in the same order:
//!
//! 1. The source table is read from the `SourceRegistry` and its normalize
//!    transform is applied. This is where sources get tagged, e.g. by
//!    synthesizing an id column that keeps rows from different sources
//!    apart.
//! 2. The sub query transform is applied.
//! 3. Joins are applied in declaration order. Each join places the mapping
//!    table's columns in front of the incoming table's columns.
//! 4. The projection selects and renames the output columns.
//!
//! # Federation
//!
//! A `QueryBatch` maps a logical query name to several specs ("shards"),
//! typically the same query against different copies of a source.
//! `execute_all` runs every shard and unions the outputs per name, in
//! declared shard order. Whether one failing name aborts the whole batch is
//! controlled by `FailureMode`.
pub mod batch;
pub mod config;
pub mod errors;
pub mod executor;
pub mod join;
pub mod plan;
pub mod project;
pub mod source;
pub mod table;
pub mod transform;

pub use batch::{BatchResults, execute_all};
pub use config::{ExecutionConfig, FailureMode, PlanDocument};
pub use errors::{FedError, Result};
pub use executor::execute;
pub use join::apply_joins;
pub use plan::{JoinKind, JoinStep, ProjectionEntry, QueryBatch, QuerySpec};
pub use project::project;
pub use source::{SourceEntry, SourceRegistry};
pub use table::{Table, Value};
