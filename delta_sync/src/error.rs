//! Error types for DeltaSync

use thiserror::Error;

/// Result type for DeltaSync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for DeltaSync
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connectivity error: {0}")]
    ConnectivityError(String),

    #[error("Failed to read table `{table}`: {reason}")]
    SnapshotReadError { table: String, reason: String },

    #[error("No usable key for table `{table}`: {reason}")]
    KeyExtractionError { table: String, reason: String },

    #[error("Malformed script: {0}")]
    MalformedScriptError(String),

    #[error("Statement {index} failed after {applied} applied: {reason}")]
    StatementExecutionError {
        /// Zero-based position of the failing statement in the script.
        index: usize,
        /// Statements already applied to the target. Partial application is
        /// possible; the caller must reconcile manually.
        applied: usize,
        statement: String,
        reason: String,
    },

    #[error("Deploy cancelled after {applied} statements")]
    Cancelled { applied: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Convert Serde JSON errors to DeltaSync errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to DeltaSync errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}
