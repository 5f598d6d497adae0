//! Balance Ledger -- the only writer of balance fields and the transaction
//! log.
//!
//! `reserve` rides the store's atomic conditional debit, so a balance can
//! never be observed negative no matter how many submissions race. Every
//! balance mutation is paired with an append-only transaction entry; when
//! the entry cannot be appended after its mutation committed, the ledger
//! immediately applies the compensating mutation before surfacing the
//! error.

use std::sync::Arc;

use cadenza_core::TransactionKind;
use cadenza_storage::{
    AccountRecord, PackageRecord, RecordStore, StorageError, TransactionRecord,
};
use rust_decimal::Decimal;

use crate::error::LedgerError;
use crate::ids;

pub struct Ledger<S> {
    store: Arc<S>,
}

impl<S> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Ledger {
            store: self.store.clone(),
        }
    }
}

impl<S: RecordStore> Ledger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Ledger { store }
    }

    /// Read the owning account.
    pub async fn account(&self, user_id: &str) -> Result<AccountRecord, LedgerError> {
        Ok(self.store.get_account(user_id).await?)
    }

    /// Atomically reserve `amount` tokens against `user_id`.
    ///
    /// On success the balance is decremented, `total_used` incremented, and
    /// a Usage transaction of `-amount` appended, linked to
    /// `generation_id`. On `InsufficientBalance` nothing is mutated.
    pub async fn reserve(
        &self,
        user_id: &str,
        amount: i64,
        generation_id: Option<&str>,
    ) -> Result<AccountRecord, LedgerError> {
        let account = self.store.debit_balance(user_id, amount).await.map_err(|e| {
            match e {
                StorageError::InsufficientBalance {
                    balance, requested, ..
                } => LedgerError::InsufficientBalance {
                    balance,
                    required: requested,
                },
                other => LedgerError::Storage(other),
            }
        })?;

        let entry = TransactionRecord {
            id: ids::new_id("txn"),
            user_id: user_id.to_string(),
            generation_id: generation_id.map(str::to_string),
            kind: TransactionKind::Usage,
            token_amount: -amount,
            price_usd: None,
            package_name: None,
            payment_ref: None,
            created_at: ids::now_rfc3339(),
        };
        if let Err(err) = self.store.insert_transaction(entry).await {
            // The debit committed but its log entry did not. Undo the debit
            // before surfacing, so no tokens are lost to a partial write.
            if let Err(undo) = self.store.credit_balance(user_id, amount, false).await {
                tracing::error!(
                    user = user_id,
                    amount,
                    error = %undo,
                    "failed to undo debit after transaction append failure"
                );
            }
            return Err(LedgerError::Storage(err));
        }

        tracing::debug!(user = user_id, amount, balance = account.token_balance, "tokens reserved");
        Ok(account)
    }

    /// Unconditionally credit `amount` tokens (a Refund compensation).
    pub async fn credit(
        &self,
        user_id: &str,
        amount: i64,
        kind: TransactionKind,
        generation_id: Option<&str>,
    ) -> Result<AccountRecord, LedgerError> {
        self.append_credit(user_id, amount, kind, generation_id, None, None, None)
            .await
    }

    /// Credit a purchased token package, recording its monetary fields.
    pub async fn purchase(
        &self,
        user_id: &str,
        package: &PackageRecord,
    ) -> Result<AccountRecord, LedgerError> {
        let payment_ref = format!("sim_{}", time::OffsetDateTime::now_utc().unix_timestamp());
        self.append_credit(
            user_id,
            package.token_amount,
            TransactionKind::Purchase,
            None,
            Some(package.price_usd),
            Some(package.name.clone()),
            Some(payment_ref),
        )
        .await
    }

    /// The user's transaction history, newest first. `limit` 0 = no limit.
    pub async fn recent_transactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        Ok(self.store.list_transactions(user_id, limit).await?)
    }

    #[allow(clippy::too_many_arguments)]
    async fn append_credit(
        &self,
        user_id: &str,
        amount: i64,
        kind: TransactionKind,
        generation_id: Option<&str>,
        price_usd: Option<Decimal>,
        package_name: Option<String>,
        payment_ref: Option<String>,
    ) -> Result<AccountRecord, LedgerError> {
        debug_assert!(matches!(
            kind,
            TransactionKind::Purchase | TransactionKind::Refund
        ));

        let purchased = kind == TransactionKind::Purchase;
        let account = self.store.credit_balance(user_id, amount, purchased).await?;

        let entry = TransactionRecord {
            id: ids::new_id("txn"),
            user_id: user_id.to_string(),
            generation_id: generation_id.map(str::to_string),
            kind,
            token_amount: amount,
            price_usd,
            package_name,
            payment_ref,
            created_at: ids::now_rfc3339(),
        };
        if let Err(err) = self.store.insert_transaction(entry).await {
            // Mirror of the reserve path: take the credit back so balance
            // and log stay consistent. The conditional debit can lose to a
            // concurrent spend of the same tokens; that is logged and
            // accepted -- the user keeps the difference.
            if let Err(undo) = self.store.debit_balance(user_id, amount).await {
                tracing::error!(
                    user = user_id,
                    amount,
                    error = %undo,
                    "failed to undo credit after transaction append failure"
                );
            }
            return Err(LedgerError::Storage(err));
        }

        tracing::debug!(
            user = user_id,
            amount,
            kind = %kind,
            balance = account.token_balance,
            "tokens credited"
        );
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_core::ModelTier;
    use cadenza_storage::MemoryStore;

    async fn store_with_account(balance: i64) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .create_account(AccountRecord {
                user_id: "u1".to_string(),
                email: "u1@example.com".to_string(),
                display_name: None,
                token_balance: balance,
                total_purchased: balance,
                total_used: 0,
                default_model: ModelTier::Tier1,
                auto_download: false,
                email_notifications: true,
                created_at: "2025-01-01T00:00:00Z".to_string(),
                updated_at: "2025-01-01T00:00:00Z".to_string(),
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn reserve_debits_and_logs_usage() {
        let store = store_with_account(100).await;
        let ledger = Ledger::new(store.clone());

        let account = ledger.reserve("u1", 10, Some("gen-1")).await.unwrap();
        assert_eq!(account.token_balance, 90);
        assert_eq!(account.total_used, 10);

        let txs = ledger.recent_transactions("u1", 0).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].kind, TransactionKind::Usage);
        assert_eq!(txs[0].token_amount, -10);
        assert_eq!(txs[0].generation_id.as_deref(), Some("gen-1"));
    }

    #[tokio::test]
    async fn reserve_beyond_balance_is_a_no_op() {
        let store = store_with_account(5).await;
        let ledger = Ledger::new(store.clone());

        let err = ledger.reserve("u1", 10, None).await.unwrap_err();
        match err {
            LedgerError::InsufficientBalance { balance, required } => {
                assert_eq!(balance, 5);
                assert_eq!(required, 10);
            }
            other => panic!("expected InsufficientBalance, got {other}"),
        }

        let account = ledger.account("u1").await.unwrap();
        assert_eq!(account.token_balance, 5);
        assert!(ledger.recent_transactions("u1", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn refund_restores_balance_and_logs() {
        let store = store_with_account(100).await;
        let ledger = Ledger::new(store.clone());

        ledger.reserve("u1", 10, Some("gen-1")).await.unwrap();
        let account = ledger
            .credit("u1", 10, TransactionKind::Refund, Some("gen-1"))
            .await
            .unwrap();
        assert_eq!(account.token_balance, 100);
        // Refunds never count toward total_purchased.
        assert_eq!(account.total_purchased, 100);

        let txs = ledger.recent_transactions("u1", 0).await.unwrap();
        let sum: i64 = txs.iter().map(|t| t.token_amount).sum();
        assert_eq!(txs.len(), 2);
        assert_eq!(sum, 0);
    }

    #[tokio::test]
    async fn purchase_records_monetary_fields() {
        let store = store_with_account(0).await;
        let ledger = Ledger::new(store.clone());

        let package = PackageRecord {
            id: "pkg-1".to_string(),
            name: "Creator".to_string(),
            description: None,
            token_amount: 500,
            price_usd: Decimal::new(1999, 2),
            is_active: true,
            display_order: 2,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };
        let account = ledger.purchase("u1", &package).await.unwrap();
        assert_eq!(account.token_balance, 500);
        assert_eq!(account.total_purchased, 500);

        let txs = ledger.recent_transactions("u1", 0).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].kind, TransactionKind::Purchase);
        assert_eq!(txs[0].token_amount, 500);
        assert_eq!(txs[0].price_usd, Some(Decimal::new(1999, 2)));
        assert_eq!(txs[0].package_name.as_deref(), Some("Creator"));
        assert!(txs[0].payment_ref.as_deref().unwrap().starts_with("sim_"));
    }
}
