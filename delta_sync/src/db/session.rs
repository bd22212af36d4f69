//! Database session handling
//!
//! This module defines the session contract the core consumes and provides
//! the MySQL implementation over a sqlx connection pool.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::mysql::{MySqlPoolOptions, MySqlRow};
use sqlx::{Column, FromRow, MySqlPool, Row as _, TypeInfo};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::script::quote_ident;
use crate::snapshot::types::{ColumnSpec, IndexSpec, Row, Value};

/// The operations the core needs from a database session.
#[async_trait]
pub trait DatabaseSession: Send + Sync {
    /// Enumerate the tables visible to this session.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Column metadata for one table, in ordinal position order.
    async fn describe_columns(&self, table: &str) -> Result<Vec<ColumnSpec>>;

    /// All rows of one table, in server return order.
    async fn fetch_rows(&self, table: &str) -> Result<Vec<Row>>;

    /// Indexes of one table, each with its columns in key order.
    async fn list_indexes(&self, table: &str) -> Result<Vec<IndexSpec>>;

    /// Verbatim CREATE TABLE text from the server.
    async fn create_statement(&self, table: &str) -> Result<String>;

    /// Execute one statement, returning the affected row count.
    async fn execute(&self, statement: &str) -> Result<u64>;
}

/// A MySQL session over a sqlx connection pool
#[derive(Debug, Clone)]
pub struct MySqlSession {
    pool: MySqlPool,
    database: String,
}

impl MySqlSession {
    /// Create a new session from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool_size = config.pool_size.unwrap_or(10);
        let timeout_seconds = config.timeout_seconds.unwrap_or(30);

        let pool = MySqlPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| {
                Error::ConnectivityError(format!(
                    "Failed to connect to `{}`: {}",
                    config.database, e
                ))
            })?;

        Ok(Self {
            pool,
            database: config.database.clone(),
        })
    }

    /// The schema name this session reads metadata from
    pub fn database(&self) -> &str {
        &self.database
    }
}

// Row types for information_schema queries
#[derive(FromRow)]
struct ColumnRow {
    column_name: String,
    data_type: String,
    is_nullable: String,
    column_key: String,
}

#[derive(FromRow)]
struct IndexRow {
    index_name: String,
    column_name: String,
    non_unique: i64,
}

#[async_trait]
impl DatabaseSession for MySqlSession {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let sql = r#"
            SELECT table_name AS table_name
            FROM information_schema.tables
            WHERE table_schema = ?
              AND table_type = 'BASE TABLE'
            ORDER BY table_name
        "#;

        let rows = sqlx::query(sql)
            .bind(&self.database)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(Error::from))
            .collect()
    }

    async fn describe_columns(&self, table: &str) -> Result<Vec<ColumnSpec>> {
        let sql = r#"
            SELECT
                column_name AS column_name,
                column_type AS data_type,
                is_nullable AS is_nullable,
                column_key AS column_key
            FROM information_schema.columns
            WHERE table_schema = ? AND table_name = ?
            ORDER BY ordinal_position
        "#;

        let column_rows = sqlx::query_as::<_, ColumnRow>(sql)
            .bind(&self.database)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        Ok(column_rows
            .into_iter()
            .map(|col| ColumnSpec {
                name: col.column_name,
                data_type: col.data_type.to_lowercase(),
                nullable: col.is_nullable == "YES",
                primary_key: col.column_key == "PRI",
            })
            .collect())
    }

    async fn fetch_rows(&self, table: &str) -> Result<Vec<Row>> {
        let sql = format!("SELECT * FROM {}", quote_ident(table));
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                let mut decoded = Row::new();
                for idx in 0..row.columns().len() {
                    let name = row.columns()[idx].name().to_string();
                    decoded.insert(name, decode_value(row, idx)?);
                }
                Ok(decoded)
            })
            .collect()
    }

    async fn list_indexes(&self, table: &str) -> Result<Vec<IndexSpec>> {
        let sql = r#"
            SELECT
                index_name AS index_name,
                column_name AS column_name,
                CAST(non_unique AS SIGNED) AS non_unique
            FROM information_schema.statistics
            WHERE table_schema = ? AND table_name = ?
            ORDER BY index_name, seq_in_index
        "#;

        let index_rows = sqlx::query_as::<_, IndexRow>(sql)
            .bind(&self.database)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        // Rows arrive one per (index, column); fold multi-column indexes
        // into a single spec, keeping key order.
        let mut indexes: Vec<IndexSpec> = Vec::new();
        for row in index_rows {
            match indexes.last_mut() {
                Some(last) if last.name == row.index_name => {
                    last.columns.push(row.column_name);
                }
                _ => indexes.push(IndexSpec {
                    name: row.index_name,
                    columns: vec![row.column_name],
                    unique: row.non_unique == 0,
                }),
            }
        }

        Ok(indexes)
    }

    async fn create_statement(&self, table: &str) -> Result<String> {
        let sql = format!("SHOW CREATE TABLE {}", quote_ident(table));
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;

        // SHOW CREATE TABLE returns (name, create text)
        Ok(row.try_get::<String, _>(1)?)
    }

    async fn execute(&self, statement: &str) -> Result<u64> {
        let result = sqlx::query(statement).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

/// Decode one result-set cell into a typed value, branching on the server's
/// reported column type.
fn decode_value(row: &MySqlRow, idx: usize) -> Result<Value> {
    let type_name = row.columns()[idx].type_info().name();

    let value = match type_name {
        "BOOLEAN" => row.try_get::<Option<bool>, _>(idx)?.map(Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => row
            .try_get_unchecked::<Option<i64>, _>(idx)?
            .map(Value::Int),
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" | "BIT" => row
            .try_get_unchecked::<Option<u64>, _>(idx)?
            .map(Value::UInt),
        "FLOAT" | "DOUBLE" => row
            .try_get_unchecked::<Option<f64>, _>(idx)?
            .map(Value::Float),
        "DECIMAL" => row
            .try_get_unchecked::<Option<String>, _>(idx)?
            .map(Value::Decimal),
        "DATE" => row.try_get::<Option<NaiveDate>, _>(idx)?.map(Value::Date),
        "DATETIME" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)?
            .map(Value::DateTime),
        "TIMESTAMP" => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)?
            .map(|ts| Value::DateTime(ts.naive_utc())),
        "JSON" => row
            .try_get::<Option<serde_json::Value>, _>(idx)?
            .map(Value::Json),
        "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET"
        | "TIME" => row
            .try_get_unchecked::<Option<String>, _>(idx)?
            .map(Value::Text),
        _ => row
            .try_get_unchecked::<Option<Vec<u8>>, _>(idx)?
            .map(Value::Bytes),
    };

    Ok(value.unwrap_or(Value::Null))
}
