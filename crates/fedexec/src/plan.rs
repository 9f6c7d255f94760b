//! Declarative query plans.
//!
//! A `QuerySpec` describes a single query against a named source: an optional
//! sub query transform, an ordered list of joins against mapping tables, and a
//! final projection. Specs are plain values; executing one never modifies it.
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::table::Table;
use crate::transform::{TableTransform, TransformRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    /// Keep every mapping row.
    Left,
    /// Keep every incoming row.
    #[default]
    Right,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "LEFT"),
            Self::Right => write!(f, "RIGHT"),
        }
    }
}

/// Join a mapping table against the incoming table.
///
/// `left_keys` reference columns in the mapping table, `right_keys` reference
/// columns in the incoming table. Keys pair up by position.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinStep {
    pub mapping: Table,
    pub left_keys: Vec<String>,
    pub right_keys: Vec<String>,
    pub kind: JoinKind,
}

impl JoinStep {
    pub fn new<L, R>(
        mapping: Table,
        left_keys: impl IntoIterator<Item = L>,
        right_keys: impl IntoIterator<Item = R>,
    ) -> Self
    where
        L: Into<String>,
        R: Into<String>,
    {
        JoinStep {
            mapping,
            left_keys: left_keys.into_iter().map(Into::into).collect(),
            right_keys: right_keys.into_iter().map(Into::into).collect(),
            kind: JoinKind::Right,
        }
    }

    pub fn with_kind(mut self, kind: JoinKind) -> Self {
        self.kind = kind;
        self
    }
}

impl fmt::Display for JoinStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let conditions: Vec<_> = self
            .left_keys
            .iter()
            .zip(self.right_keys.iter())
            .map(|(l, r)| format!("{l} = {r}"))
            .collect();
        write!(
            f,
            "{} JOIN {} ON {}",
            self.kind,
            self.mapping.label(),
            conditions.join(" AND ")
        )
    }
}

/// Read `source` from the input and write it as `target` in the output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectionEntry {
    pub source: String,
    pub target: String,
}

impl ProjectionEntry {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        ProjectionEntry {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Project a column under its own name.
    ///
    /// A qualified source ("users.name") produces the bare column name.
    pub fn column(source: impl Into<String>) -> Self {
        let source = source.into();
        let target = match source.split_once('.') {
            Some((_, name)) => name.to_string(),
            None => source.clone(),
        };
        ProjectionEntry { source, target }
    }
}

impl fmt::Display for ProjectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source == self.target {
            write!(f, "{}", self.source)
        } else {
            write!(f, "{} AS {}", self.source, self.target)
        }
    }
}

/// A single query against a named source.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub source: String,
    pub sub_query: Option<TransformRef>,
    pub joins: Vec<JoinStep>,
    pub projection: Vec<ProjectionEntry>,
}

impl QuerySpec {
    pub fn new(source: impl Into<String>) -> Self {
        QuerySpec {
            source: source.into(),
            sub_query: None,
            joins: Vec::new(),
            projection: Vec::new(),
        }
    }

    pub fn with_sub_query(mut self, sub_query: impl TableTransform + 'static) -> Self {
        self.sub_query = Some(Arc::new(sub_query));
        self
    }

    pub fn with_sub_query_ref(mut self, sub_query: TransformRef) -> Self {
        self.sub_query = Some(sub_query);
        self
    }

    pub fn with_join(mut self, join: JoinStep) -> Self {
        self.joins.push(join);
        self
    }

    pub fn with_projection(
        mut self,
        projection: impl IntoIterator<Item = ProjectionEntry>,
    ) -> Self {
        self.projection.extend(projection);
        self
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let projection: Vec<_> = self.projection.iter().map(|p| p.to_string()).collect();
        write!(f, "SELECT {} FROM {}", projection.join(", "), self.source)?;
        if let Some(sub_query) = &self.sub_query {
            write!(f, " | {}", sub_query.name())?;
        }
        for join in &self.joins {
            write!(f, " {join}")?;
        }
        Ok(())
    }
}

/// Queries to execute, keyed by logical query name.
///
/// Each name maps to one or more shards whose results get unioned.
pub type QueryBatch = IndexMap<String, Vec<QuerySpec>>;
