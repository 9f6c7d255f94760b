use std::collections::HashSet;

use crate::errors::{FedError, Result};
use crate::plan::ProjectionEntry;
use crate::table::{Field, Table};

/// Select and rename columns for the final output.
///
/// Output columns appear in the order of `projection`. Output fields are
/// unqualified.
pub fn project(table: &Table, projection: &[ProjectionEntry]) -> Result<Table> {
    let mut targets = HashSet::with_capacity(projection.len());
    for entry in projection {
        if !targets.insert(entry.target.as_str()) {
            return Err(FedError::DuplicateProjection {
                target: entry.target.clone(),
            });
        }
    }

    let columns = projection
        .iter()
        .map(|entry| {
            let idx = table.column_index(&entry.source)?;
            Ok((idx, Field::new(&entry.target)))
        })
        .collect::<Result<Vec<_>>>()?;

    table.select_indices(&columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use crate::table::Value;

    fn users() -> Table {
        Table::from_rows(
            ["name", "id", "age"],
            [row!["Alice", 1, 30], row!["Bob", 2, 24]],
        )
        .unwrap()
        .with_relation("users")
    }

    #[test]
    fn preserves_declared_order() {
        let out = project(
            &users(),
            &[
                ProjectionEntry::column("id"),
                ProjectionEntry::new("name", "label"),
            ],
        )
        .unwrap();

        assert_eq!(vec!["id", "label"], out.column_names());
        assert_eq!("id, label", out.schema().to_string());
        assert_eq!(&[row![1, "Alice"], row![2, "Bob"]], out.rows());
    }

    #[test]
    fn same_column_twice_under_different_names() {
        let out = project(
            &users(),
            &[
                ProjectionEntry::new("users.id", "a"),
                ProjectionEntry::new("id", "b"),
            ],
        )
        .unwrap();
        assert_eq!(&[row![1, 1], row![2, 2]], out.rows());
    }

    #[test]
    fn missing_column() {
        let err = project(&users(), &[ProjectionEntry::column("email")]).unwrap_err();
        match err {
            FedError::MissingColumn { table, column } => {
                assert_eq!("users", table);
                assert_eq!("email", column);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_target() {
        let err = project(
            &users(),
            &[
                ProjectionEntry::new("id", "x"),
                ProjectionEntry::new("name", "x"),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, FedError::DuplicateProjection { target } if target == "x"));
    }

    #[test]
    fn duplicate_target_checked_before_resolution() {
        let err = project(
            &users(),
            &[
                ProjectionEntry::new("missing", "x"),
                ProjectionEntry::new("name", "x"),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, FedError::DuplicateProjection { .. }));
    }

    #[test]
    fn empty_projection() {
        let out = project(&users(), &[]).unwrap();
        assert_eq!(0, out.arity());
        assert_eq!(2, out.num_rows());
        assert_eq!(Vec::<Value>::new(), out.rows()[0].values);
    }
}
