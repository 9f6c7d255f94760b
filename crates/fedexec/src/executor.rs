//! Single query execution.
//!
//! Every query runs the same fixed pipeline:
//!
//! 1. Resolve the source and apply its normalize transform.
//! 2. Apply the query's sub query (identity if unset).
//! 3. Apply join steps in declaration order.
//! 4. Project.
use tracing::{debug, debug_span};

use crate::errors::Result;
use crate::join::apply_joins;
use crate::plan::QuerySpec;
use crate::project::project;
use crate::source::SourceRegistry;
use crate::table::Table;
use crate::transform::apply_transform;

/// Execute a single query against the registry.
pub fn execute(spec: &QuerySpec, registry: &SourceRegistry) -> Result<Table> {
    let _span = debug_span!("execute", source = %spec.source).entered();

    let entry = registry.resolve(&spec.source)?;

    let tagged = apply_transform(entry.normalize.as_ref(), entry.table.clone())?;
    debug!(normalize = entry.normalize.name(), rows = tagged.num_rows(), "normalized source");

    let filtered = match &spec.sub_query {
        Some(sub_query) => {
            let out = apply_transform(sub_query.as_ref(), tagged)?;
            debug!(sub_query = sub_query.name(), rows = out.num_rows(), "applied sub query");
            out
        }
        None => tagged,
    };

    let joined = apply_joins(filtered, &spec.joins)?;
    debug!(joins = spec.joins.len(), rows = joined.num_rows(), "applied joins");

    let out = project(&joined, &spec.projection)?;
    debug!(columns = %out.schema(), rows = out.num_rows(), "projected output");

    Ok(out)
}
