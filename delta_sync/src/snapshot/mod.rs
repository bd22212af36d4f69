//! Snapshot module for DeltaSync
//!
//! This module captures a database's tables, columns, and rows in memory.

pub mod reader;
pub mod types;

// Re-export key types
pub use reader::SnapshotReader;
pub use types::{ColumnSpec, IndexSpec, Row, RowKey, Snapshot, TableSnapshot, Value};
