use async_trait::async_trait;

use cadenza_core::GenerationStatus;

use crate::error::StorageError;
use crate::record::{
    AccountRecord, AccountSettings, GenerationRecord, PackageRecord, TransactionRecord,
};

/// The storage trait for Cadenza persistence backends.
///
/// A `RecordStore` implementation provides durable storage for accounts,
/// generation records, the append-only token transaction log, and the
/// token package catalog.
///
/// ## Atomicity
///
/// Two operations are conditional updates and MUST be atomic in the
/// backend — a single compare-and-swap against the stored row, never a
/// read followed by a separate write:
///
/// - `debit_balance` checks `token_balance >= amount` and decrements in
///   one step. Concurrent debits against the same account must never
///   drive the balance negative or lose an update.
/// - `transition_generation` moves a record's status only if it currently
///   holds the expected `from` status. Racing drivers get exactly one
///   winner; the losers observe [`StorageError::StatusConflict`].
///
/// Everything else is plain record CRUD with no cross-record transaction;
/// callers that need multi-record consistency compensate at their own
/// layer.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so they can be shared
/// across spawned generation drive tasks.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    // ── Accounts ─────────────────────────────────────────────────────────

    /// Insert a new account record.
    ///
    /// Returns `Err(StorageError::DuplicateAccount)` if the user id exists.
    /// Concurrent creates of the same id have exactly one winner.
    async fn create_account(&self, record: AccountRecord) -> Result<(), StorageError>;

    /// Read an account by user id.
    ///
    /// Returns `Err(StorageError::AccountNotFound)` if absent.
    async fn get_account(&self, user_id: &str) -> Result<AccountRecord, StorageError>;

    /// Rewrite the user-editable preference fields and stamp `updated_at`.
    /// Balance fields are untouched.
    async fn update_account_settings(
        &self,
        user_id: &str,
        settings: AccountSettings,
    ) -> Result<AccountRecord, StorageError>;

    /// Atomically debit `amount` tokens if the balance covers it.
    ///
    /// On success decrements `token_balance`, increments `total_used`, and
    /// returns the updated record. On a failed condition returns
    /// `Err(StorageError::InsufficientBalance)` with the observed balance
    /// and performs no mutation. `amount` must be positive.
    async fn debit_balance(
        &self,
        user_id: &str,
        amount: i64,
    ) -> Result<AccountRecord, StorageError>;

    /// Unconditionally credit `amount` tokens.
    ///
    /// Increments `token_balance`; when `purchased` is true also increments
    /// `total_purchased`. Returns the updated record. `amount` must be
    /// positive.
    async fn credit_balance(
        &self,
        user_id: &str,
        amount: i64,
        purchased: bool,
    ) -> Result<AccountRecord, StorageError>;

    // ── Transactions (append-only) ───────────────────────────────────────

    /// Append a transaction record. Records are never updated or deleted.
    async fn insert_transaction(&self, record: TransactionRecord) -> Result<(), StorageError>;

    /// List a user's transactions, newest first. `limit` 0 means no limit.
    async fn list_transactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, StorageError>;

    // ── Generations ──────────────────────────────────────────────────────

    /// Insert a new generation record.
    ///
    /// Returns `Err(StorageError::DuplicateGeneration)` if the id exists.
    async fn create_generation(&self, record: GenerationRecord) -> Result<(), StorageError>;

    /// Read a generation record by id.
    async fn get_generation(&self, generation_id: &str)
        -> Result<GenerationRecord, StorageError>;

    /// Conditionally move a generation's status from `from` to `to`.
    ///
    /// The update applies only if the record currently holds status `from`;
    /// otherwise returns `Err(StorageError::StatusConflict)` with the
    /// actual status and changes nothing. `completed_at` and
    /// `error_message` are written when provided (terminal transitions set
    /// one or both). Returns the updated record.
    async fn transition_generation(
        &self,
        generation_id: &str,
        from: GenerationStatus,
        to: GenerationStatus,
        completed_at: Option<String>,
        error_message: Option<String>,
    ) -> Result<GenerationRecord, StorageError>;

    /// Rename a generation (history surface).
    async fn set_generation_title(
        &self,
        generation_id: &str,
        title: &str,
    ) -> Result<GenerationRecord, StorageError>;

    /// List a user's generations, newest first. `limit` 0 means no limit.
    async fn list_generations(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<GenerationRecord>, StorageError>;

    // ── Packages ─────────────────────────────────────────────────────────

    /// List active token packages in display order.
    async fn list_active_packages(&self) -> Result<Vec<PackageRecord>, StorageError>;
}
