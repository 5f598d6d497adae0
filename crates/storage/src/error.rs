use cadenza_core::GenerationStatus;

/// All errors that can be returned by a RecordStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No account with the given user id.
    #[error("account not found: {user_id}")]
    AccountNotFound { user_id: String },

    /// Conditional debit rejected — the stored balance was below the
    /// requested amount. The account is unchanged.
    #[error("insufficient balance for {user_id}: have {balance}, need {requested}")]
    InsufficientBalance {
        user_id: String,
        balance: i64,
        requested: i64,
    },

    /// An account with this user id already exists.
    #[error("account already exists: {user_id}")]
    DuplicateAccount { user_id: String },

    /// No generation record with the given id.
    #[error("generation not found: {generation_id}")]
    GenerationNotFound { generation_id: String },

    /// Conditional status transition rejected — the record was not in the
    /// expected status. The record is unchanged.
    #[error("status conflict on generation {generation_id}: expected {expected}, found {actual}")]
    StatusConflict {
        generation_id: String,
        expected: GenerationStatus,
        actual: GenerationStatus,
    },

    /// A generation record with this id already exists.
    #[error("generation already exists: {generation_id}")]
    DuplicateGeneration { generation_id: String },

    /// A transaction record with this id already exists. Transactions are
    /// append-only; an id collision is always a caller bug.
    #[error("transaction already exists: {transaction_id}")]
    DuplicateTransaction { transaction_id: String },

    /// A backend-specific storage error (connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
