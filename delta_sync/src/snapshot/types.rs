//! Type definitions for database snapshots

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single typed cell value read from the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Exact decimal kept in its textual server form.
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// The scalar primary-key value identifying a row across snapshots.
///
/// Every differenced table is assumed to have exactly one key column;
/// integer keys are the default, string keys are supported via a per-table
/// configuration override.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RowKey {
    Int(i64),
    Text(String),
}

impl RowKey {
    /// Derive a key from a cell value, if the value is a usable scalar.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(RowKey::Int(*i)),
            Value::UInt(u) => i64::try_from(*u).ok().map(RowKey::Int),
            Value::Text(s) => Some(RowKey::Text(s.clone())),
            _ => None,
        }
    }

    /// The key as a cell value, for literal encoding in WHERE clauses.
    pub fn to_value(&self) -> Value {
        match self {
            RowKey::Int(i) => Value::Int(*i),
            RowKey::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Int(i) => write!(f, "{}", i),
            RowKey::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Column metadata as read from the server. Immutable once read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    /// Declared type in lowercased server form, e.g. `"json"`, `"datetime"`,
    /// `"int(11)"`.
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
}

/// A secondary index, with its columns in key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// A row as an insertion-ordered column → value map.
pub type Row = IndexMap<String, Value>;

/// One table's structure and data at snapshot time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    /// Verbatim CREATE TABLE text from the server.
    pub create_statement: String,
    pub indexes: Vec<IndexSpec>,
    /// The resolved row-identity column, when the table has a usable one.
    pub key_column: Option<String>,
    /// Rows keyed by primary-key value, in source query order.
    pub rows: IndexMap<RowKey, Row>,
}

impl TableSnapshot {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            create_statement: String::new(),
            indexes: Vec::new(),
            key_column: None,
            rows: IndexMap::new(),
        }
    }

    /// Element-wise column comparison; order matters, so a reordered column
    /// list counts as a structural change.
    pub fn columns_match(&self, other: &TableSnapshot) -> bool {
        self.columns == other.columns
    }
}

/// An in-memory capture of one database's tables, columns, and rows.
///
/// Built once per comparison pass and immutable thereafter. Tables are kept
/// sorted so downstream output is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub database: String,
    pub tables: BTreeMap<String, TableSnapshot>,
}

impl Snapshot {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            tables: BTreeMap::new(),
        }
    }

    pub fn add_table(&mut self, table: TableSnapshot) {
        self.tables.insert(table.name.clone(), table);
    }
}
