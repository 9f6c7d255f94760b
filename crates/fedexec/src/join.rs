//! The join pipeline.
//!
//! Each step joins a mapping table (left side) against the incoming table
//! (right side) using an equi-join on the paired key columns. The mapping
//! table's columns come first in the output.
use hashbrown::HashMap;
use tracing::trace;

use crate::errors::{FedError, Result};
use crate::plan::{JoinKind, JoinStep};
use crate::table::{JoinKey, Lookup, Row, Table};

/// Apply every join step in order, feeding each step's output into the next.
pub fn apply_joins(table: Table, joins: &[JoinStep]) -> Result<Table> {
    joins.iter().enumerate().try_fold(table, |table, (idx, step)| {
        trace!(step = idx, %step, rows = table.num_rows(), "applying join step");
        join_step(step, &table)
    })
}

/// Join a single mapping table against `table`.
pub fn join_step(step: &JoinStep, table: &Table) -> Result<Table> {
    if step.left_keys.len() != step.right_keys.len() {
        return Err(FedError::JoinKeyArity {
            left: step.left_keys.len(),
            right: step.right_keys.len(),
        });
    }

    let mapping = &step.mapping;
    let left_cols = resolve_keys(mapping, &step.left_keys)?;
    let right_cols = resolve_keys(table, &step.right_keys)?;

    let schema = mapping.schema().merge(table.schema());
    let rows = match step.kind {
        JoinKind::Right => {
            outer_join(table, &right_cols, mapping, &left_cols, |preserved, matched| {
                matched.concat(preserved)
            })
        }
        JoinKind::Left => {
            outer_join(mapping, &left_cols, table, &right_cols, |preserved, matched| {
                preserved.concat(matched)
            })
        }
    };

    table.with_rows(schema, rows)
}

fn resolve_keys(table: &Table, keys: &[String]) -> Result<Vec<usize>> {
    keys.iter()
        .map(|key| match table.schema().lookup(key) {
            Lookup::Found(idx) => Ok(idx),
            Lookup::Missing => Err(FedError::MissingJoinKey {
                table: table.label().to_string(),
                key: key.clone(),
            }),
            Lookup::Ambiguous => Err(FedError::AmbiguousColumn {
                table: table.label().to_string(),
                column: key.clone(),
            }),
        })
        .collect()
}

/// Normalized key for a row, `None` if any key column can't match.
fn row_key(row: &Row, cols: &[usize]) -> Option<Vec<JoinKey>> {
    cols.iter().map(|&idx| row.values[idx].join_key()).collect()
}

/// Hash join where every row of `preserved` appears in the output at least
/// once, in order.
///
/// Each preserved row is emitted once per matching row in `other` (in the
/// order of `other`), or once alongside nulls if nothing matches. Rows in
/// `other` without a match are dropped. `combine` receives the preserved row
/// and its partner and lays them out in output column order.
fn outer_join<F>(
    preserved: &Table,
    preserved_cols: &[usize],
    other: &Table,
    other_cols: &[usize],
    combine: F,
) -> Vec<Row>
where
    F: Fn(&Row, &Row) -> Row,
{
    let mut hash_table: HashMap<Vec<JoinKey>, Vec<usize>> = HashMap::new();
    for (idx, row) in other.rows().iter().enumerate() {
        if let Some(key) = row_key(row, other_cols) {
            hash_table.entry(key).or_default().push(idx);
        }
    }

    let null_row = Row::nulls(other.arity());
    let mut out = Vec::with_capacity(preserved.num_rows());

    for row in preserved.rows() {
        let matches = row_key(row, preserved_cols).and_then(|key| hash_table.get(&key));
        match matches {
            Some(matches) => {
                for &idx in matches {
                    out.push(combine(row, &other.rows()[idx]));
                }
            }
            None => out.push(combine(row, &null_row)),
        }
    }

    out
}
