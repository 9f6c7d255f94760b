//! Table to table transforms.
//!
//! Transforms are used in two places: normalizing a source table when a query
//! reads it, and the optional sub query applied before any joins.
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::errors::{FedError, Result};
use crate::table::{Field, Table, Value};

/// Column name used for synthesized ids if none is provided.
pub const DEFAULT_ID_COLUMN: &str = "ID";

pub trait TableTransform: Debug + Send + Sync {
    /// Short name used in logs and plan output.
    fn name(&self) -> &str;

    fn apply(&self, table: Table) -> Result<Table>;
}

/// Shared handle to a transform.
pub type TransformRef = Arc<dyn TableTransform>;

#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl TableTransform for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn apply(&self, table: Table) -> Result<Table> {
        Ok(table)
    }
}

/// Synthesize an id column by prefixing the string form of another column.
///
/// Used to keep ids distinct when the same logical entity is read from
/// several sources. Null inputs produce null ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixId {
    pub prefix: String,
    pub column: String,
    pub target: String,
}

impl PrefixId {
    pub fn new(prefix: impl Into<String>, column: impl Into<String>) -> Self {
        PrefixId {
            prefix: prefix.into(),
            column: column.into(),
            target: DEFAULT_ID_COLUMN.to_string(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }
}

impl TableTransform for PrefixId {
    fn name(&self) -> &str {
        "prefix_id"
    }

    fn apply(&self, table: Table) -> Result<Table> {
        let idx = table.column_index(&self.column)?;
        let field = match table.name() {
            Some(relation) => Field::qualified(relation, &self.target),
            None => Field::new(&self.target),
        };
        Ok(table.with_column(field, |row| match &row.values[idx] {
            Value::Null => Value::Null,
            v => Value::Utf8(format!("{}{}", self.prefix, v)),
        }))
    }
}

/// Keep only the listed columns, in the listed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectColumns {
    pub columns: Vec<String>,
}

impl TableTransform for SelectColumns {
    fn name(&self) -> &str {
        "select"
    }

    fn apply(&self, table: Table) -> Result<Table> {
        table.select(self.columns.as_slice())
    }
}

/// Keep rows where a column equals a value.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterEq {
    pub column: String,
    pub value: Value,
}

impl TableTransform for FilterEq {
    fn name(&self) -> &str {
        "filter_eq"
    }

    fn apply(&self, table: Table) -> Result<Table> {
        let idx = table.column_index(&self.column)?;
        let key = self.value.join_key();
        Ok(table.filter(|row| key.is_some() && row.values[idx].join_key() == key))
    }
}

/// Rename columns, old name to new name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub columns: Vec<(String, String)>,
}

impl TableTransform for Rename {
    fn name(&self) -> &str {
        "rename"
    }

    fn apply(&self, table: Table) -> Result<Table> {
        table.rename(self.columns.as_slice())
    }
}

/// Adapter for arbitrary closures.
pub struct FnTransform<F> {
    name: String,
    f: F,
}

impl<F> FnTransform<F>
where
    F: Fn(Table) -> Result<Table> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        FnTransform {
            name: name.into(),
            f,
        }
    }
}

impl<F> Debug for FnTransform<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransform")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<F> TableTransform for FnTransform<F>
where
    F: Fn(Table) -> Result<Table> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, table: Table) -> Result<Table> {
        (self.f)(table)
    }
}

/// Apply a transform, attaching the transform name to any failure that isn't
/// already a typed resolution error.
pub(crate) fn apply_transform(transform: &dyn TableTransform, table: Table) -> Result<Table> {
    transform.apply(table).map_err(|e| match e {
        FedError::InvalidTable(message) => FedError::Transform {
            name: transform.name().to_string(),
            message,
        },
        other => other,
    })
}
