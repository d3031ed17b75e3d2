/// Statement Execution Module
///
/// Runs non-returning statements inside their own transaction. Unlike reads
/// and bulk writes, failures here are absorbed: the transaction is rolled
/// back, the failure is logged, and the caller gets an `ExecutionOutcome`.
use crate::core::db::engine::{Engine, NamedParams, Session};
use crate::core::{DataManagerError, Result};
use tracing::{debug, error};

/// Result of running a statement through [`execute`].
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// The statement ran and its transaction committed
    Committed { rows_affected: usize },
    /// The statement failed and its transaction was rolled back
    Failed { error: DataManagerError },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Committed { .. })
    }

    pub fn error(&self) -> Option<&DataManagerError> {
        match self {
            ExecutionOutcome::Failed { error } => Some(error),
            ExecutionOutcome::Committed { .. } => None,
        }
    }

    /// Converts back into a `Result` for callers that want to propagate.
    pub fn into_result(self) -> Result<usize> {
        match self {
            ExecutionOutcome::Committed { rows_affected } => Ok(rows_affected),
            ExecutionOutcome::Failed { error } => Err(error),
        }
    }
}

/// Executes a statement that returns no rows, committing on success.
///
/// On failure the session is rolled back and the error is logged and kept in
/// the returned outcome rather than propagated.
pub fn execute<E: Engine>(sql: &str, engine: &mut E, params: &NamedParams) -> ExecutionOutcome {
    match run_in_session(sql, engine, params) {
        Ok(rows_affected) => {
            debug!(rows_affected, "statement committed");
            ExecutionOutcome::Committed { rows_affected }
        }
        Err(err) => {
            error!(error = %err, sql, "statement failed and was rolled back");
            ExecutionOutcome::Failed { error: err }
        }
    }
}

fn run_in_session<E: Engine>(sql: &str, engine: &mut E, params: &NamedParams) -> Result<usize> {
    let mut session = engine.begin()?;
    match session.execute(sql, params) {
        Ok(rows) => {
            session.commit()?;
            Ok(rows)
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback() {
                error!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
