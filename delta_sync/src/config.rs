//! Configuration handling for DeltaSync
//!
//! All configuration is an explicit structure handed to the client by the
//! caller; the core never reads process-wide state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;

use crate::error::{Error, Result};

/// Load configuration from a TOML file
pub fn load_from_file(path: &str) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .map_err(|e| Error::ConfigError(format!("Failed to read config file: {}", e)))?;

    let config: Config = toml::from_str(&config_str)
        .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;

    Ok(config)
}

/// Represents the complete DeltaSync configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub source: DatabaseConfig,
    pub target: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub script: ScriptConfig,
    pub logging: Option<LoggingConfig>,
}

/// Database connection configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    /// Schema name used for metadata queries and script headers.
    pub database: String,
    pub pool_size: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

/// Diffing and deployment behavior configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SyncConfig {
    /// Per-table override of the row-identity column. Tables not listed here
    /// use their single-column primary key.
    #[serde(default)]
    pub key_columns: HashMap<String, String>,
    /// Log the synthesized statements instead of executing them.
    #[serde(default)]
    pub dry_run: bool,
}

/// Script synthesis configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ScriptConfig {
    /// Persist synthesized scripts to this path as a side effect.
    pub output_file: Option<String>,
    /// Wrap incremental scripts in the full SET preamble and COMMIT trailer,
    /// as when persisted standalone. Inline scripts omit it.
    #[serde(default)]
    pub standalone: bool,
    /// Emit CREATE DATABASE / USE in full-dump scripts.
    #[serde(default)]
    pub create_database: bool,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: String,
    pub stdout: bool,
    pub include_timestamps: bool,
}
