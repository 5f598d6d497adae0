use cadenza_storage::StorageError;

/// Errors from Balance Ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The conditional debit was rejected; the account is unchanged and no
    /// transaction was appended.
    #[error("insufficient balance: have {balance}, need {required}")]
    InsufficientBalance { balance: i64, required: i64 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors from submitting or driving a generation.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Rejected before any side effect: empty prompt or out-of-bound
    /// duration.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The reservation was rejected; no record was created and no
    /// transaction appended.
    #[error("insufficient balance: have {balance}, need {required}")]
    InsufficientBalance { balance: i64, required: i64 },

    /// No active package with the given id.
    #[error("package not found: {package_id}")]
    PackageNotFound { package_id: String },

    /// A record-store operation failed. The workflow reconciles the ledger
    /// before surfacing this (a committed debit whose record write failed
    /// has already been refunded).
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The spawned drive task died without producing an outcome.
    #[error("generation drive task failed: {0}")]
    Internal(String),
}

impl From<LedgerError> for WorkflowError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance { balance, required } => {
                WorkflowError::InsufficientBalance { balance, required }
            }
            LedgerError::Storage(e) => WorkflowError::Storage(e),
        }
    }
}

/// Why a generation reached the `Failed` state.
///
/// By the time a caller observes one of these, the compensating refund has
/// already been applied -- failure reporting never precedes reconciliation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationFailure {
    #[error("synthesis failed: {message}")]
    Synthesis { message: String },

    #[error("synthesis timed out after {seconds}s")]
    Timeout { seconds: u64 },
}
