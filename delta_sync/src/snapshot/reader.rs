//! Snapshot reader
//!
//! Builds an in-memory snapshot of a database's tables, columns, and rows
//! from a live session.

use crate::config::SyncConfig;
use crate::db::session::DatabaseSession;
use crate::error::{Error, Result};
use crate::snapshot::types::{RowKey, Snapshot, TableSnapshot, Value};

/// Reads full snapshots from a database session
pub struct SnapshotReader<'a> {
    session: &'a dyn DatabaseSession,
    config: &'a SyncConfig,
}

impl<'a> SnapshotReader<'a> {
    /// Create a new snapshot reader
    pub fn new(session: &'a dyn DatabaseSession, config: &'a SyncConfig) -> Self {
        Self { session, config }
    }

    /// Capture every table visible to the session.
    ///
    /// Failing to enumerate tables is fatal. A failure reading one table's
    /// rows is logged and leaves that table's row map empty, so diffing is
    /// not blocked by a single malformed table.
    pub async fn read(&self, database: &str) -> Result<Snapshot> {
        let tables = self.session.list_tables().await.map_err(|e| {
            Error::ConnectivityError(format!("Cannot enumerate tables of `{}`: {}", database, e))
        })?;

        let mut snapshot = Snapshot::new(database);
        for table_name in tables {
            match self.read_structure(&table_name).await {
                Ok(mut table) => {
                    if let Err(e) = self.read_rows(&mut table).await {
                        tracing::warn!(
                            table = table_name.as_str(),
                            error = %e,
                            "Leaving rows empty for unreadable table"
                        );
                        table.rows.clear();
                    }
                    snapshot.add_table(table);
                }
                Err(e) => {
                    tracing::warn!(
                        table = table_name.as_str(),
                        error = %e,
                        "Skipping table with unreadable structure"
                    );
                }
            }
        }

        tracing::info!(
            database,
            tables = snapshot.tables.len(),
            "Snapshot captured"
        );
        Ok(snapshot)
    }

    async fn read_structure(&self, name: &str) -> Result<TableSnapshot> {
        let mut table = TableSnapshot::new(name);
        table.columns = self.session.describe_columns(name).await?;
        table.create_statement = self.session.create_statement(name).await?;
        table.indexes = self.session.list_indexes(name).await?;
        table.key_column = self.resolve_key_column(&table);
        Ok(table)
    }

    /// The row-identity column: a configured override, or the table's
    /// single-column primary key. Composite keys degrade to structure-only.
    fn resolve_key_column(&self, table: &TableSnapshot) -> Option<String> {
        if let Some(key) = self.config.key_columns.get(&table.name) {
            if table.columns.iter().any(|c| &c.name == key) {
                return Some(key.clone());
            }
            tracing::warn!(
                table = table.name.as_str(),
                key_column = key.as_str(),
                "Configured key column does not exist; table degrades to structure-only"
            );
            return None;
        }

        let mut primary = table.columns.iter().filter(|c| c.primary_key);
        match (primary.next(), primary.next()) {
            (Some(column), None) => Some(column.name.clone()),
            (Some(_), Some(_)) => {
                tracing::warn!(
                    table = table.name.as_str(),
                    "Composite primary key; rows will not be differenced"
                );
                None
            }
            (None, _) => None,
        }
    }

    async fn read_rows(&self, table: &mut TableSnapshot) -> Result<()> {
        let Some(key_column) = table.key_column.clone() else {
            tracing::debug!(
                table = table.name.as_str(),
                "No usable key column; structure captured without rows"
            );
            return Ok(());
        };

        let rows = self.session.fetch_rows(&table.name).await?;
        for row in rows {
            let key_value = row.get(&key_column).cloned().unwrap_or(Value::Null);
            let Some(key) = RowKey::from_value(&key_value) else {
                return Err(Error::SnapshotReadError {
                    table: table.name.clone(),
                    reason: format!("Key column `{}` holds a non-scalar value", key_column),
                });
            };
            if table.rows.insert(key, row).is_some() {
                tracing::warn!(
                    table = table.name.as_str(),
                    "Duplicate key value; keeping the later row"
                );
            }
        }
        Ok(())
    }
}
