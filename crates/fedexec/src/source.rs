use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{FedError, Result};
use crate::table::Table;
use crate::transform::{Identity, TableTransform, TransformRef};

/// A named table along with the transform applied every time it's read.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub name: String,
    pub table: Table,
    pub normalize: TransformRef,
}

impl SourceEntry {
    /// Create a new entry. The table is qualified with the source name.
    pub fn new(name: impl Into<String>, table: Table) -> Self {
        let name = name.into();
        SourceEntry {
            table: table.with_relation(name.clone()),
            name,
            normalize: Arc::new(Identity),
        }
    }

    pub fn with_normalize(mut self, normalize: impl TableTransform + 'static) -> Self {
        self.normalize = Arc::new(normalize);
        self
    }

    pub fn with_normalize_ref(mut self, normalize: TransformRef) -> Self {
        self.normalize = normalize;
        self
    }
}

/// Lookup of sources by name.
///
/// Built up front and read-only afterwards. Executions only ever borrow the
/// registry.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, SourceEntry>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, entry: SourceEntry) -> Result<Self> {
        if self.sources.contains_key(&entry.name) {
            return Err(FedError::DuplicateSource { name: entry.name });
        }
        self.sources.insert(entry.name.clone(), entry);
        Ok(self)
    }

    pub fn resolve(&self, name: &str) -> Result<&SourceEntry> {
        self.sources
            .get(name)
            .ok_or_else(|| FedError::UnknownSource {
                name: name.to_string(),
            })
    }

    /// Names of all registered sources, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.sources.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    fn table() -> Table {
        Table::from_rows(["id"], [row![1]]).unwrap()
    }

    #[test]
    fn resolve_qualifies_table() {
        let registry = SourceRegistry::new()
            .with_source(SourceEntry::new("users", table()))
            .unwrap();

        let entry = registry.resolve("users").unwrap();
        assert_eq!(Some("users"), entry.table.name());
        assert_eq!("users.id", entry.table.schema().to_string());
        assert_eq!("identity", entry.normalize.name());
    }

    #[test]
    fn unknown_source() {
        let registry = SourceRegistry::new();
        let err = registry.resolve("users").unwrap_err();
        assert!(matches!(err, FedError::UnknownSource { name } if name == "users"));
    }

    #[test]
    fn duplicate_source() {
        let err = SourceRegistry::new()
            .with_source(SourceEntry::new("users", table()))
            .unwrap()
            .with_source(SourceEntry::new("users", table()))
            .unwrap_err();
        assert!(matches!(err, FedError::DuplicateSource { .. }));
    }

    #[test]
    fn names_sorted() {
        let registry = SourceRegistry::new()
            .with_source(SourceEntry::new("b", table()))
            .unwrap()
            .with_source(SourceEntry::new("a", table()))
            .unwrap();
        assert_eq!(vec!["a", "b"], registry.names());
    }
}
