//! Utility module for DeltaSync

pub mod logging;
