//! SQL synthesizer
//!
//! Consumes a difference report and emits an ordered, human-auditable
//! script; also renders the full-dump form of a single snapshot.

use chrono::Utc;
use std::collections::HashSet;

use crate::config::ScriptConfig;
use crate::diff::DiffReport;
use crate::script::encoder::encode;
use crate::script::extract::KeyedInsert;
use crate::script::quote_ident;
use crate::snapshot::types::{Row, RowKey, Snapshot, TableSnapshot, Value};

const PREAMBLE: &[&str] = &[
    "SET FOREIGN_KEY_CHECKS = 0;",
    "SET SQL_MODE = \"NO_AUTO_VALUE_ON_ZERO\";",
    "SET AUTOCOMMIT = 0;",
    "START TRANSACTION;",
    "SET time_zone = \"+00:00\";",
];

const TRAILER: &[&str] = &["COMMIT;", "SET FOREIGN_KEY_CHECKS = 1;"];

/// Script generator for difference reports and full dumps
pub struct ScriptSynthesizer<'a> {
    config: &'a ScriptConfig,
}

impl<'a> ScriptSynthesizer<'a> {
    /// Create a new synthesizer
    pub fn new(config: &'a ScriptConfig) -> Self {
        Self { config }
    }

    /// Render the incremental script for a difference report.
    ///
    /// Order is deterministic: added tables (create + batched insert),
    /// removed tables, structural advisories, then row inserts, updates and
    /// deletes. Every statement carries a preceding audit comment naming the
    /// table and, for row changes, the key.
    pub fn synthesize_diff(&self, report: &DiffReport, source: &Snapshot) -> String {
        let mut lines: Vec<String> = Vec::new();

        for table_name in &report.tables_added {
            let Some(table) = source.tables.get(table_name) else {
                continue;
            };
            lines.push(format!("-- table {}", quote_ident(table_name)));
            lines.push(terminated(&table.create_statement));
            if !table.rows.is_empty() {
                lines.push(format!("-- data for table {}", quote_ident(table_name)));
                lines.push(batched_insert(table));
            }
            lines.push(String::new());
        }

        for table_name in &report.tables_removed {
            lines.push(format!(
                "-- table {} is absent from the source",
                quote_ident(table_name)
            ));
            lines.push(format!("DROP TABLE IF EXISTS {};", quote_ident(table_name)));
            lines.push(String::new());
        }

        // No ALTER synthesis: structural reconciliation stays a reviewed,
        // manual step.
        for table_name in &report.tables_modified {
            lines.push(format!(
                "-- table {} has structural changes; review and reconcile manually",
                quote_ident(table_name)
            ));
            lines.push(String::new());
        }

        for added in &report.rows_added {
            let Some(table) = source.tables.get(&added.table) else {
                continue;
            };
            lines.push(format!(
                "-- insert into {} (key {})",
                quote_ident(&added.table),
                added.key
            ));
            lines.push(insert_row(table, &added.row));
            lines.push(String::new());
        }

        for modified in &report.rows_modified {
            let Some(table) = source.tables.get(&modified.table) else {
                continue;
            };
            let Some(key_column) = table.key_column.as_deref() else {
                continue;
            };
            lines.push(format!(
                "-- update {} (key {})",
                quote_ident(&modified.table),
                modified.key
            ));
            lines.push(update_row(table, key_column, &modified.key, &modified.source_row));
            lines.push(String::new());
        }

        for removed in &report.rows_removed {
            let Some(table) = source.tables.get(&removed.table) else {
                continue;
            };
            let Some(key_column) = table.key_column.as_deref() else {
                continue;
            };
            lines.push(format!(
                "-- delete from {} (key {})",
                quote_ident(&removed.table),
                removed.key
            ));
            lines.push(format!(
                "DELETE FROM {} WHERE {} = {};",
                quote_ident(&removed.table),
                quote_ident(key_column),
                key_literal(table, key_column, &removed.key)
            ));
            lines.push(String::new());
        }

        self.finish(lines, &source.database, "Incremental deployment script")
    }

    /// Render a full dump of one snapshot: structure first, then data,
    /// wrapped in the constraint-disabling preamble.
    pub fn synthesize_dump(&self, snapshot: &Snapshot) -> String {
        let mut lines: Vec<String> = Vec::new();

        if self.config.create_database {
            lines.push(format!(
                "CREATE DATABASE IF NOT EXISTS {};",
                quote_ident(&snapshot.database)
            ));
            lines.push(format!("USE {};", quote_ident(&snapshot.database)));
            lines.push(String::new());
        }

        lines.push("-- Database structure".to_string());
        lines.push("-- --------------------------------------------------------".to_string());
        lines.push(String::new());

        let mut seen_indexes = HashSet::new();
        for table in snapshot.tables.values() {
            lines.push(terminated(&table.create_statement));
            // Primary and unique keys are already embedded in the create
            // statement; only plain secondary indexes are re-created.
            for index in &table.indexes {
                if index.name == "PRIMARY" || index.unique {
                    continue;
                }
                if !seen_indexes.insert((table.name.clone(), index.name.clone())) {
                    continue;
                }
                let columns = index
                    .columns
                    .iter()
                    .map(|c| quote_ident(c))
                    .collect::<Vec<_>>()
                    .join(", ");
                lines.push(format!(
                    "CREATE INDEX {} ON {} ({});",
                    quote_ident(&index.name),
                    quote_ident(&table.name),
                    columns
                ));
            }
        }
        lines.push(String::new());

        lines.push("-- Database data".to_string());
        lines.push("-- --------------------------------------------------------".to_string());
        lines.push(String::new());

        for table in snapshot.tables.values() {
            if table.rows.is_empty() {
                continue;
            }
            lines.push(format!("-- data for table {}", quote_ident(&table.name)));
            lines.push(batched_insert(table));
            lines.push(String::new());
        }

        self.wrap(lines, &snapshot.database, "Database export")
    }

    /// Render a script of recovered inserts, one audit comment per row.
    pub fn synthesize_inserts(&self, inserts: &[KeyedInsert], database: &str) -> String {
        let mut lines: Vec<String> = Vec::new();
        for insert in inserts {
            lines.push(format!(
                "-- insert into {} (key {})",
                quote_ident(&insert.table),
                insert.key
            ));
            lines.push(terminated(&insert.statement));
            lines.push(String::new());
        }
        self.finish(lines, database, "Incremental deployment script")
    }

    /// Inline scripts are the bare statements; standalone scripts retain the
    /// header and SET block for later replay from storage.
    fn finish(&self, lines: Vec<String>, database: &str, title: &str) -> String {
        if self.config.standalone {
            self.wrap(lines, database, title)
        } else {
            join_trimmed(lines)
        }
    }

    fn wrap(&self, body: Vec<String>, database: &str, title: &str) -> String {
        let mut lines: Vec<String> = Vec::new();
        lines.push(format!("-- {}", title));
        lines.push(format!(
            "-- Generated: {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        ));
        lines.push(format!("-- Database: {}", database));
        lines.push(String::new());
        lines.extend(PREAMBLE.iter().map(|s| s.to_string()));
        lines.push(String::new());
        lines.extend(body);
        lines.extend(TRAILER.iter().map(|s| s.to_string()));
        join_trimmed(lines)
    }
}

fn join_trimmed(lines: Vec<String>) -> String {
    let mut script = lines.join("\n");
    while script.ends_with('\n') {
        script.pop();
    }
    if script.is_empty() {
        script
    } else {
        script.push('\n');
        script
    }
}

/// Append a terminator unless the statement already carries one.
fn terminated(statement: &str) -> String {
    let trimmed = statement.trim_end();
    if trimmed.ends_with(';') {
        trimmed.to_string()
    } else {
        format!("{};", trimmed)
    }
}

fn column_list(table: &TableSnapshot) -> String {
    table
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn row_tuple(table: &TableSnapshot, row: &Row) -> String {
    table
        .columns
        .iter()
        .map(|col| {
            let value = row.get(&col.name).unwrap_or(&Value::Null);
            encode(value, &col.data_type)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn insert_row(table: &TableSnapshot, row: &Row) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({});",
        quote_ident(&table.name),
        column_list(table),
        row_tuple(table, row)
    )
}

/// One tuple per row, joined into a single batched INSERT.
fn batched_insert(table: &TableSnapshot) -> String {
    let tuples = table
        .rows
        .values()
        .map(|row| format!("({})", row_tuple(table, row)))
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        "INSERT INTO {} ({}) VALUES\n{};",
        quote_ident(&table.name),
        column_list(table),
        tuples
    )
}

/// Whole-row update: every column is assigned, not just the changed ones, so
/// re-applying the statement converges on the same row.
fn update_row(table: &TableSnapshot, key_column: &str, key: &RowKey, row: &Row) -> String {
    let assignments = table
        .columns
        .iter()
        .map(|col| {
            let value = row.get(&col.name).unwrap_or(&Value::Null);
            format!("{} = {}", quote_ident(&col.name), encode(value, &col.data_type))
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {} WHERE {} = {};",
        quote_ident(&table.name),
        assignments,
        quote_ident(key_column),
        key_literal(table, key_column, key)
    )
}

fn key_literal(table: &TableSnapshot, key_column: &str, key: &RowKey) -> String {
    let column_type = table
        .columns
        .iter()
        .find(|c| c.name == key_column)
        .map(|c| c.data_type.as_str())
        .unwrap_or("");
    encode(&key.to_value(), column_type)
}
