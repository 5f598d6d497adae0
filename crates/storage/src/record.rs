use cadenza_core::{GenerationStatus, ModelTier, TransactionKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A user account as stored in the backend.
///
/// `token_balance` is never negative; `total_purchased` and `total_used`
/// are monotonically non-decreasing. Balance fields are mutated only
/// through [`RecordStore::debit_balance`](crate::RecordStore::debit_balance)
/// and [`RecordStore::credit_balance`](crate::RecordStore::credit_balance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub user_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub token_balance: i64,
    pub total_purchased: i64,
    pub total_used: i64,
    pub default_model: ModelTier,
    pub auto_download: bool,
    pub email_notifications: bool,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created_at: String,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub updated_at: String,
}

/// The user-editable slice of an account, written as one unit by the
/// settings surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSettings {
    pub display_name: Option<String>,
    pub default_model: ModelTier,
    pub auto_download: bool,
    pub email_notifications: bool,
}

/// A generation request as stored in the backend.
///
/// `tokens_reserved` is fixed at creation. `status` moves only through
/// [`RecordStore::transition_generation`](crate::RecordStore::transition_generation);
/// `completed_at` and `error_message` are set only by the terminal
/// transitions. Audio bytes are never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: String,
    pub user_id: String,
    pub prompt: String,
    pub title: Option<String>,
    pub model: ModelTier,
    pub duration_seconds: u32,
    pub status: GenerationStatus,
    pub tokens_reserved: i64,
    pub error_message: Option<String>,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created_at: String,
    /// ISO 8601 / RFC 3339 timestamp string. None until a terminal state.
    pub completed_at: Option<String>,
}

/// An append-only token ledger entry.
///
/// `token_amount` is signed: negative for Usage, positive for Purchase and
/// Refund. The monetary fields are present only on Purchase entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub user_id: String,
    pub generation_id: Option<String>,
    pub kind: TransactionKind,
    pub token_amount: i64,
    pub price_usd: Option<Decimal>,
    pub package_name: Option<String>,
    pub payment_ref: Option<String>,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created_at: String,
}

/// A purchasable token bundle, read-only to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub token_amount: i64,
    pub price_usd: Decimal,
    pub is_active: bool,
    pub display_order: i32,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created_at: String,
}
