//! Snapshot difference calculator
//!
//! This module compares two snapshots' table structures and row sets and
//! classifies everything as added, removed, or modified.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::snapshot::types::{Row, RowKey, Snapshot};

/// A row present only in the source
#[derive(Debug, Clone, Serialize)]
pub struct RowAdded {
    pub table: String,
    pub key: RowKey,
    pub row: Row,
}

/// A row present in both snapshots whose values differ; both full versions
/// are carried.
#[derive(Debug, Clone, Serialize)]
pub struct RowModified {
    pub table: String,
    pub key: RowKey,
    pub source_row: Row,
    pub target_row: Row,
}

/// A row present only in the target
#[derive(Debug, Clone, Serialize)]
pub struct RowRemoved {
    pub table: String,
    pub key: RowKey,
    pub row: Row,
}

/// Changes needed to bring the target in line with the source
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffReport {
    pub tables_added: BTreeSet<String>,
    pub tables_removed: BTreeSet<String>,
    pub tables_modified: BTreeSet<String>,
    pub rows_added: Vec<RowAdded>,
    pub rows_modified: Vec<RowModified>,
    pub rows_removed: Vec<RowRemoved>,
}

impl DiffReport {
    /// Generate a difference report between two snapshots.
    ///
    /// Structure first: tables only in the source are added, tables only in
    /// the target removed, and common tables whose column sequences are not
    /// element-wise identical are flagged modified wholesale — no per-column
    /// delta is computed. Rows are then differenced for the remaining common
    /// tables, keyed by primary-key value, with full-row equality.
    pub fn generate(source: &Snapshot, target: &Snapshot) -> Self {
        let mut report = DiffReport::default();

        for name in source.tables.keys() {
            if !target.tables.contains_key(name) {
                report.tables_added.insert(name.clone());
            }
        }
        for name in target.tables.keys() {
            if !source.tables.contains_key(name) {
                report.tables_removed.insert(name.clone());
            }
        }
        for (name, source_table) in &source.tables {
            if let Some(target_table) = target.tables.get(name) {
                if !source_table.columns_match(target_table) {
                    report.tables_modified.insert(name.clone());
                }
            }
        }

        for (name, source_table) in &source.tables {
            let Some(target_table) = target.tables.get(name) else {
                continue;
            };
            if report.tables_modified.contains(name) {
                continue;
            }
            if source_table.key_column.is_none() || target_table.key_column.is_none() {
                tracing::debug!(table = name.as_str(), "No usable key; skipping row diff");
                continue;
            }

            for (key, row) in &source_table.rows {
                match target_table.rows.get(key) {
                    None => report.rows_added.push(RowAdded {
                        table: name.clone(),
                        key: key.clone(),
                        row: row.clone(),
                    }),
                    Some(target_row) if target_row != row => {
                        report.rows_modified.push(RowModified {
                            table: name.clone(),
                            key: key.clone(),
                            source_row: row.clone(),
                            target_row: target_row.clone(),
                        });
                    }
                    Some(_) => {}
                }
            }
            for (key, row) in &target_table.rows {
                if !source_table.rows.contains_key(key) {
                    report.rows_removed.push(RowRemoved {
                        table: name.clone(),
                        key: key.clone(),
                        row: row.clone(),
                    });
                }
            }
        }

        report
    }

    /// Check if the report is empty (no changes needed)
    pub fn is_empty(&self) -> bool {
        self.tables_added.is_empty()
            && self.tables_removed.is_empty()
            && self.tables_modified.is_empty()
            && self.rows_added.is_empty()
            && self.rows_modified.is_empty()
            && self.rows_removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::types::{ColumnSpec, Snapshot, TableSnapshot, Value};
    use pretty_assertions::assert_eq;

    fn column(name: &str, data_type: &str, primary_key: bool) -> ColumnSpec {
        ColumnSpec {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: false,
            primary_key,
        }
    }

    fn users_table(rows: &[(i64, &str)]) -> TableSnapshot {
        let mut table = TableSnapshot::new("users");
        table.columns = vec![column("id", "int(11)", true), column("name", "varchar(255)", false)];
        table.create_statement =
            "CREATE TABLE `users` (`id` int(11) NOT NULL, `name` varchar(255) NOT NULL, PRIMARY KEY (`id`))".to_string();
        table.key_column = Some("id".to_string());
        for (id, name) in rows {
            let mut row = Row::new();
            row.insert("id".to_string(), Value::Int(*id));
            row.insert("name".to_string(), Value::Text(name.to_string()));
            table.rows.insert(RowKey::Int(*id), row);
        }
        table
    }

    fn snapshot_with(table: TableSnapshot) -> Snapshot {
        let mut snapshot = Snapshot::new("movies_db");
        snapshot.add_table(table);
        snapshot
    }

    #[test]
    fn identical_snapshots_produce_an_empty_report() {
        let source = snapshot_with(users_table(&[(1, "Ann"), (2, "Bo")]));
        let target = snapshot_with(users_table(&[(1, "Ann"), (2, "Bo")]));
        let report = DiffReport::generate(&source, &target);
        assert!(report.is_empty());
    }

    #[test]
    fn source_only_table_is_added_and_nothing_else() {
        let source = snapshot_with(users_table(&[(1, "Ann")]));
        let target = Snapshot::new("movies_db");
        let report = DiffReport::generate(&source, &target);
        assert!(report.tables_added.contains("users"));
        assert!(report.tables_modified.is_empty());
        assert!(report.rows_added.is_empty());
    }

    #[test]
    fn target_only_table_is_removed() {
        let source = Snapshot::new("movies_db");
        let target = snapshot_with(users_table(&[(1, "Ann")]));
        let report = DiffReport::generate(&source, &target);
        assert_eq!(report.tables_removed.len(), 1);
        assert!(report.tables_removed.contains("users"));
    }

    #[test]
    fn row_only_in_source_is_added_exactly_once_with_its_key() {
        let source = snapshot_with(users_table(&[(1, "Ann"), (7, "Bo")]));
        let target = snapshot_with(users_table(&[(1, "Ann")]));
        let report = DiffReport::generate(&source, &target);
        assert_eq!(report.rows_added.len(), 1);
        assert_eq!(report.rows_added[0].table, "users");
        assert_eq!(report.rows_added[0].key, RowKey::Int(7));
        assert!(report.rows_modified.is_empty());
        assert!(report.rows_removed.is_empty());
    }

    #[test]
    fn row_only_in_target_is_removed() {
        let source = snapshot_with(users_table(&[(1, "Ann")]));
        let target = snapshot_with(users_table(&[(1, "Ann"), (2, "Bo")]));
        let report = DiffReport::generate(&source, &target);
        assert_eq!(report.rows_removed.len(), 1);
        assert_eq!(report.rows_removed[0].key, RowKey::Int(2));
    }

    #[test]
    fn one_changed_column_moves_the_whole_row_to_modified() {
        let source = snapshot_with(users_table(&[(1, "Ann"), (2, "Bobby")]));
        let target = snapshot_with(users_table(&[(1, "Ann"), (2, "Bo")]));
        let report = DiffReport::generate(&source, &target);
        assert_eq!(report.rows_modified.len(), 1);
        let modified = &report.rows_modified[0];
        assert_eq!(modified.key, RowKey::Int(2));
        assert_eq!(
            modified.source_row.get("name"),
            Some(&Value::Text("Bobby".to_string()))
        );
        assert_eq!(
            modified.target_row.get("name"),
            Some(&Value::Text("Bo".to_string()))
        );
    }

    #[test]
    fn reordered_columns_flag_the_table_as_modified() {
        let source = snapshot_with(users_table(&[(1, "Ann")]));
        let mut reordered = users_table(&[(1, "Ann")]);
        reordered.columns.reverse();
        let target = snapshot_with(reordered);
        let report = DiffReport::generate(&source, &target);
        assert!(report.tables_modified.contains("users"));
        // Structurally modified tables are excluded from row diffing.
        assert!(report.rows_added.is_empty());
        assert!(report.rows_modified.is_empty());
    }

    #[test]
    fn tables_without_a_key_are_skipped_by_the_row_diff() {
        let mut source_table = users_table(&[(1, "Ann")]);
        source_table.key_column = None;
        source_table.rows.clear();
        let mut target_table = users_table(&[]);
        target_table.key_column = None;
        let source = snapshot_with(source_table);
        let target = snapshot_with(target_table);
        let report = DiffReport::generate(&source, &target);
        assert!(report.is_empty());
    }
}
