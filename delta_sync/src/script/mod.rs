//! Script module for DeltaSync
//!
//! This module renders values and difference reports as SQL text, splits
//! script text back into executable statements, and recovers keyed rows
//! from previously rendered scripts.

pub mod encoder;
pub mod extract;
pub mod synthesizer;
pub mod tokenizer;

// Re-export key types
pub use extract::KeyedInsert;
pub use synthesizer::ScriptSynthesizer;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;

/// The two statement classes a script carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    Ddl,
    Dml,
}

/// One individually executable statement.
///
/// Created by the synthesizer or recovered by the tokenizer; consumed by the
/// executor and then discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub kind: StatementKind,
    pub text: String,
}

impl Statement {
    pub fn new(kind: StatementKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Backtick-quote an identifier, doubling embedded backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Persist script text, creating parent directories as needed.
pub fn write_script_file(path: &str, script: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, script)?;
    tracing::info!(path, bytes = script.len(), "Script written");
    Ok(())
}
