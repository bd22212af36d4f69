//! Database module for DeltaSync
//!
//! This module handles database sessions and statement execution.

pub mod executor;
pub mod session;

// Re-export key types
pub use executor::{DeployReport, ScriptExecutor};
pub use session::{DatabaseSession, MySqlSession};
