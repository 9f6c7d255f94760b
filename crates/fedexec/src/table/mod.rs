//! In-memory row oriented tables.
//!
//! This is the table engine the executor calls into. Tables are immutable
//! values: every operation returns a new table and leaves the input untouched.
//!
//! Columns are identified by a `Field`, optionally qualified by the relation
//! the column came from. A column reference is either the bare column name
//! ("id") or a qualified name ("companies.id"). Bare names must match exactly
//! one field in the schema.
pub mod value;

use std::fmt;

pub use value::{JoinKey, Value};

use crate::errors::{FedError, Result, invalid_table};

const UNNAMED_TABLE: &str = "<unnamed>";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub relation: Option<String>,
    pub name: String,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Field {
            relation: None,
            name: name.into(),
        }
    }

    pub fn qualified(relation: impl Into<String>, name: impl Into<String>) -> Self {
        Field {
            relation: Some(relation.into()),
            name: name.into(),
        }
    }

    /// Check if this field is referenced by `column`.
    pub fn matches(&self, column: &str) -> bool {
        if self.name == column {
            return true;
        }
        match (&self.relation, column.split_once('.')) {
            (Some(relation), Some((rel, name))) => relation == rel && self.name == name,
            _ => false,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(relation) => write!(f, "{}.{}", relation, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Result of looking up a column reference in a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found(usize),
    Missing,
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: impl IntoIterator<Item = Field>) -> Self {
        Schema {
            fields: fields.into_iter().collect(),
        }
    }

    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    pub fn lookup(&self, column: &str) -> Lookup {
        let mut found = None;
        for (idx, field) in self.fields.iter().enumerate() {
            if field.matches(column) {
                if found.is_some() {
                    return Lookup::Ambiguous;
                }
                found = Some(idx);
            }
        }
        match found {
            Some(idx) => Lookup::Found(idx),
            None => Lookup::Missing,
        }
    }

    /// Column names in schema order, ignoring relation qualifiers.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Concatenate two schemas, `self` on the left.
    pub fn merge(&self, other: &Schema) -> Schema {
        let mut fields = self.fields.clone();
        fields.extend(other.fields.iter().cloned());
        Schema { fields }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.fields.iter().map(|f| f.to_string()).collect();
        write!(f, "{}", names.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: impl IntoIterator<Item = Value>) -> Self {
        Row {
            values: values.into_iter().collect(),
        }
    }

    pub fn nulls(arity: usize) -> Self {
        Row {
            values: vec![Value::Null; arity],
        }
    }

    pub fn arity(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Create a new row with `self` followed by `other`.
    pub fn concat(&self, other: &Row) -> Row {
        let mut values = Vec::with_capacity(self.arity() + other.arity());
        values.extend(self.values.iter().cloned());
        values.extend(other.values.iter().cloned());
        Row { values }
    }
}

impl<V: Into<Value>> FromIterator<V> for Row {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        Row::new(iter.into_iter().map(Into::into))
    }
}

/// An ordered list of rows sharing a single schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    name: Option<String>,
    schema: Schema,
    rows: Vec<Row>,
}

impl Table {
    /// Create a table with no columns and no rows.
    pub fn empty() -> Self {
        Table::default()
    }

    /// Create a new table, checking that every row matches the schema.
    pub fn try_new(schema: Schema, rows: Vec<Row>) -> Result<Self> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.arity() != schema.arity())
        {
            return Err(invalid_table!(
                "row {idx} has {} values, schema has {} columns",
                row.arity(),
                schema.arity()
            ));
        }
        Ok(Table {
            name: None,
            schema,
            rows,
        })
    }

    /// Create a table from unqualified column names and rows of values.
    pub fn from_rows<C, R>(columns: impl IntoIterator<Item = C>, rows: R) -> Result<Self>
    where
        C: Into<String>,
        R: IntoIterator<Item = Row>,
    {
        let schema = Schema::new(columns.into_iter().map(Field::new));
        Self::try_new(schema, rows.into_iter().collect())
    }

    /// Name this table and qualify all unqualified fields with the name.
    pub fn with_relation(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        for field in self.schema.fields.iter_mut() {
            if field.relation.is_none() {
                field.relation = Some(name.clone());
            }
        }
        self.name = Some(name);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name used when reporting errors about this table.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED_TABLE)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn arity(&self) -> usize {
        self.schema.arity()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema.names().map(|s| s.to_string()).collect()
    }

    /// Resolve a column reference to its index.
    pub fn column_index(&self, column: &str) -> Result<usize> {
        match self.schema.lookup(column) {
            Lookup::Found(idx) => Ok(idx),
            Lookup::Missing => Err(FedError::MissingColumn {
                table: self.label().to_string(),
                column: column.to_string(),
            }),
            Lookup::Ambiguous => Err(FedError::AmbiguousColumn {
                table: self.label().to_string(),
                column: column.to_string(),
            }),
        }
    }

    /// Get all values for a column.
    pub fn column(&self, column: &str) -> Result<Vec<Value>> {
        let idx = self.column_index(column)?;
        Ok(self.rows.iter().map(|row| row.values[idx].clone()).collect())
    }

    /// Select columns by index, producing the provided fields.
    ///
    /// `columns` pairs an input column index with the field it should be
    /// emitted as, which makes this both a selection and a rename.
    pub fn select_indices(&self, columns: &[(usize, Field)]) -> Result<Self> {
        if let Some((idx, _)) = columns.iter().find(|(idx, _)| *idx >= self.arity()) {
            return Err(invalid_table!(
                "select index {idx} out of bounds for table with {} columns",
                self.arity()
            ));
        }
        let schema = Schema::new(columns.iter().map(|(_, field)| field.clone()));
        let rows = self
            .rows
            .iter()
            .map(|row| Row::new(columns.iter().map(|(idx, _)| row.values[*idx].clone())))
            .collect();
        Ok(Table {
            name: self.name.clone(),
            schema,
            rows,
        })
    }

    /// Select a subset of columns by reference, keeping their fields.
    pub fn select(&self, columns: &[impl AsRef<str>]) -> Result<Self> {
        let columns = columns
            .iter()
            .map(|col| {
                let idx = self.column_index(col.as_ref())?;
                Ok((idx, self.schema.fields[idx].clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        self.select_indices(&columns)
    }

    /// Rename columns. Renamed fields keep their relation qualifier.
    pub fn rename(&self, renames: &[(impl AsRef<str>, impl AsRef<str>)]) -> Result<Self> {
        let mut out = self.clone();
        for (from, to) in renames {
            let idx = self.column_index(from.as_ref())?;
            out.schema.fields[idx].name = to.as_ref().to_string();
        }
        Ok(out)
    }

    /// Set a column computed from each row.
    ///
    /// If the table already has `field`, its values are replaced in place.
    /// Otherwise the column is appended.
    pub fn with_column<F>(&self, field: Field, mut f: F) -> Self
    where
        F: FnMut(&Row) -> Value,
    {
        let mut schema = self.schema.clone();
        let existing = schema.fields.iter().position(|existing| existing == &field);
        if existing.is_none() {
            schema.fields.push(field);
        }
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut values = row.values.clone();
                let val = f(row);
                match existing {
                    Some(idx) => values[idx] = val,
                    None => values.push(val),
                }
                Row { values }
            })
            .collect();
        Table {
            name: self.name.clone(),
            schema,
            rows,
        }
    }

    /// Keep rows for which `pred` returns true.
    pub fn filter<F>(&self, mut pred: F) -> Self
    where
        F: FnMut(&Row) -> bool,
    {
        Table {
            name: self.name.clone(),
            schema: self.schema.clone(),
            rows: self.rows.iter().filter(|row| pred(row)).cloned().collect(),
        }
    }

    /// Replace the rows of this table, keeping name and schema.
    pub(crate) fn with_rows(&self, schema: Schema, rows: Vec<Row>) -> Result<Self> {
        let mut table = Self::try_new(schema, rows)?;
        table.name = self.name.clone();
        Ok(table)
    }

    /// Vertically stack tables in order.
    ///
    /// Every table must have the same column names in the same order. The
    /// output takes its name and fields from the first table.
    pub fn concat(tables: impl IntoIterator<Item = Table>) -> Result<Self> {
        let mut iter = tables.into_iter();
        let mut first = match iter.next() {
            Some(table) => table,
            None => return Ok(Self::empty()),
        };

        for table in iter {
            if !first.schema.names().eq(table.schema.names()) {
                return Err(invalid_table!(
                    "cannot concat tables with differing schemas: [{}] and [{}]",
                    first.schema,
                    table.schema
                ));
            }
            first.rows.extend(table.rows);
        }

        Ok(first)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: num rows: {}, columns: [{}]",
            self.label(),
            self.num_rows(),
            self.schema
        )?;
        for (i, row) in self.rows.iter().enumerate() {
            writeln!(f)?;
            write!(f, "{i}:")?;
            for val in row.values.iter() {
                write!(f, " {val}")?;
            }
        }
        Ok(())
    }
}

/// Build a row from a list of values, converting each with `Into<Value>`.
#[macro_export]
macro_rules! row {
    ($($val:expr),* $(,)?) => {
        $crate::table::Row::new(vec![$($crate::table::Value::from($val)),*])
    };
}
