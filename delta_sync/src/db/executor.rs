//! Deploy executor
//!
//! Replays a statement sequence against one database session, strictly in
//! order, halting on the first failure. No implicit transaction wraps the
//! batch; whatever transactional statements the script itself contains are
//! the only rollback boundary, so partial application is possible and is
//! reported as fatal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::db::session::DatabaseSession;
use crate::error::{Error, Result};
use crate::script::Statement;

/// Outcome of a completed deploy
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub applied: usize,
}

/// Sequential statement executor for one database session
pub struct ScriptExecutor<'a> {
    session: &'a dyn DatabaseSession,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> ScriptExecutor<'a> {
    /// Create a new executor
    pub fn new(session: &'a dyn DatabaseSession) -> Self {
        Self {
            session,
            cancel: None,
        }
    }

    /// Attach a cancellation flag, checked between statements. A statement
    /// already in flight is not interrupted.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Execute the statements in emitted order, one at a time.
    ///
    /// The first failure halts the deploy; the error carries the index and
    /// text of the failing statement and the count already applied, for
    /// manual reconciliation. No retries: the script's `IF NOT EXISTS` /
    /// `IGNORE` forms are what make a re-run safe, not the executor.
    pub async fn deploy(&self, statements: &[Statement]) -> Result<DeployReport> {
        let mut applied = 0;

        for (index, statement) in statements.iter().enumerate() {
            if let Some(flag) = &self.cancel {
                if flag.load(Ordering::SeqCst) {
                    tracing::warn!(applied, "Deploy cancelled between statements");
                    return Err(Error::Cancelled { applied });
                }
            }

            tracing::debug!(index, kind = ?statement.kind, "Executing statement");

            match self.session.execute(&statement.text).await {
                Ok(rows_affected) => {
                    applied += 1;
                    tracing::debug!(index, rows_affected, "Statement applied");
                }
                Err(e) => {
                    return Err(Error::StatementExecutionError {
                        index,
                        applied,
                        statement: statement.text.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(applied, "Deploy complete");
        Ok(DeployReport { applied })
    }
}
