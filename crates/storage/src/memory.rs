//! In-process `RecordStore` backend.
//!
//! All records live behind one mutex, so every operation — including the
//! two conditional updates — is trivially atomic. This is the reference
//! backend for the conformance suite and the store the CLI session runs
//! against.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use cadenza_core::GenerationStatus;

use crate::error::StorageError;
use crate::record::{
    AccountRecord, AccountSettings, GenerationRecord, PackageRecord, TransactionRecord,
};
use crate::traits::RecordStore;

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, AccountRecord>,
    generations: HashMap<String, GenerationRecord>,
    /// Insertion order of generation ids; listings walk it in reverse.
    generation_order: Vec<String>,
    transactions: Vec<TransactionRecord>,
    packages: Vec<PackageRecord>,
}

/// A `RecordStore` holding everything in process memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a token package.
    pub fn insert_package(&self, record: PackageRecord) {
        self.lock().packages.push(record);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Recover data even if the mutex was poisoned by a panicking task
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_account(&self, record: AccountRecord) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.accounts.contains_key(&record.user_id) {
            return Err(StorageError::DuplicateAccount {
                user_id: record.user_id,
            });
        }
        inner.accounts.insert(record.user_id.clone(), record);
        Ok(())
    }

    async fn get_account(&self, user_id: &str) -> Result<AccountRecord, StorageError> {
        self.lock()
            .accounts
            .get(user_id)
            .cloned()
            .ok_or_else(|| StorageError::AccountNotFound {
                user_id: user_id.to_string(),
            })
    }

    async fn update_account_settings(
        &self,
        user_id: &str,
        settings: AccountSettings,
    ) -> Result<AccountRecord, StorageError> {
        let mut inner = self.lock();
        let account =
            inner
                .accounts
                .get_mut(user_id)
                .ok_or_else(|| StorageError::AccountNotFound {
                    user_id: user_id.to_string(),
                })?;
        account.display_name = settings.display_name;
        account.default_model = settings.default_model;
        account.auto_download = settings.auto_download;
        account.email_notifications = settings.email_notifications;
        account.updated_at = now_rfc3339();
        Ok(account.clone())
    }

    async fn debit_balance(
        &self,
        user_id: &str,
        amount: i64,
    ) -> Result<AccountRecord, StorageError> {
        let mut inner = self.lock();
        let account =
            inner
                .accounts
                .get_mut(user_id)
                .ok_or_else(|| StorageError::AccountNotFound {
                    user_id: user_id.to_string(),
                })?;
        if account.token_balance < amount {
            return Err(StorageError::InsufficientBalance {
                user_id: user_id.to_string(),
                balance: account.token_balance,
                requested: amount,
            });
        }
        account.token_balance -= amount;
        account.total_used += amount;
        account.updated_at = now_rfc3339();
        Ok(account.clone())
    }

    async fn credit_balance(
        &self,
        user_id: &str,
        amount: i64,
        purchased: bool,
    ) -> Result<AccountRecord, StorageError> {
        let mut inner = self.lock();
        let account =
            inner
                .accounts
                .get_mut(user_id)
                .ok_or_else(|| StorageError::AccountNotFound {
                    user_id: user_id.to_string(),
                })?;
        account.token_balance += amount;
        if purchased {
            account.total_purchased += amount;
        }
        account.updated_at = now_rfc3339();
        Ok(account.clone())
    }

    async fn insert_transaction(&self, record: TransactionRecord) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.transactions.iter().any(|t| t.id == record.id) {
            return Err(StorageError::DuplicateTransaction {
                transaction_id: record.id,
            });
        }
        inner.transactions.push(record);
        Ok(())
    }

    async fn list_transactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, StorageError> {
        let inner = self.lock();
        let mut out: Vec<TransactionRecord> = inner
            .transactions
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        if limit > 0 {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn create_generation(&self, record: GenerationRecord) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.generations.contains_key(&record.id) {
            return Err(StorageError::DuplicateGeneration {
                generation_id: record.id,
            });
        }
        inner.generation_order.push(record.id.clone());
        inner.generations.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get_generation(
        &self,
        generation_id: &str,
    ) -> Result<GenerationRecord, StorageError> {
        self.lock()
            .generations
            .get(generation_id)
            .cloned()
            .ok_or_else(|| StorageError::GenerationNotFound {
                generation_id: generation_id.to_string(),
            })
    }

    async fn transition_generation(
        &self,
        generation_id: &str,
        from: GenerationStatus,
        to: GenerationStatus,
        completed_at: Option<String>,
        error_message: Option<String>,
    ) -> Result<GenerationRecord, StorageError> {
        let mut inner = self.lock();
        let record = inner.generations.get_mut(generation_id).ok_or_else(|| {
            StorageError::GenerationNotFound {
                generation_id: generation_id.to_string(),
            }
        })?;
        if record.status != from {
            return Err(StorageError::StatusConflict {
                generation_id: generation_id.to_string(),
                expected: from,
                actual: record.status,
            });
        }
        record.status = to;
        if completed_at.is_some() {
            record.completed_at = completed_at;
        }
        if error_message.is_some() {
            record.error_message = error_message;
        }
        Ok(record.clone())
    }

    async fn set_generation_title(
        &self,
        generation_id: &str,
        title: &str,
    ) -> Result<GenerationRecord, StorageError> {
        let mut inner = self.lock();
        let record = inner.generations.get_mut(generation_id).ok_or_else(|| {
            StorageError::GenerationNotFound {
                generation_id: generation_id.to_string(),
            }
        })?;
        record.title = Some(title.to_string());
        Ok(record.clone())
    }

    async fn list_generations(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<GenerationRecord>, StorageError> {
        let inner = self.lock();
        let mut out: Vec<GenerationRecord> = inner
            .generation_order
            .iter()
            .rev()
            .filter_map(|id| inner.generations.get(id))
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect();
        if limit > 0 {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn list_active_packages(&self) -> Result<Vec<PackageRecord>, StorageError> {
        let inner = self.lock();
        let mut out: Vec<PackageRecord> = inner
            .packages
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect();
        out.sort_by_key(|p| p.display_order);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_core::{ModelTier, TransactionKind};

    fn account(user_id: &str, balance: i64) -> AccountRecord {
        AccountRecord {
            user_id: user_id.to_string(),
            email: format!("{user_id}@example.com"),
            display_name: None,
            token_balance: balance,
            total_purchased: balance,
            total_used: 0,
            default_model: ModelTier::Tier1,
            auto_download: false,
            email_notifications: true,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    fn generation(id: &str, user_id: &str) -> GenerationRecord {
        GenerationRecord {
            id: id.to_string(),
            user_id: user_id.to_string(),
            prompt: "an upbeat electronic dance track".to_string(),
            title: None,
            model: ModelTier::Tier1,
            duration_seconds: 60,
            status: GenerationStatus::Pending,
            tokens_reserved: 10,
            error_message: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn debit_respects_balance_condition() {
        let store = MemoryStore::new();
        store.create_account(account("u1", 15)).await.unwrap();

        let updated = store.debit_balance("u1", 10).await.unwrap();
        assert_eq!(updated.token_balance, 5);
        assert_eq!(updated.total_used, 10);

        let err = store.debit_balance("u1", 10).await.unwrap_err();
        match err {
            StorageError::InsufficientBalance {
                balance, requested, ..
            } => {
                assert_eq!(balance, 5);
                assert_eq!(requested, 10);
            }
            other => panic!("expected InsufficientBalance, got {other}"),
        }

        // The failed debit changed nothing.
        let acct = store.get_account("u1").await.unwrap();
        assert_eq!(acct.token_balance, 5);
        assert_eq!(acct.total_used, 10);
    }

    #[tokio::test]
    async fn credit_tracks_purchases_separately() {
        let store = MemoryStore::new();
        store.create_account(account("u1", 0)).await.unwrap();

        store.credit_balance("u1", 50, true).await.unwrap();
        let acct = store.credit_balance("u1", 10, false).await.unwrap();
        assert_eq!(acct.token_balance, 60);
        assert_eq!(acct.total_purchased, 50);
    }

    #[tokio::test]
    async fn transition_is_conditional_on_current_status() {
        let store = MemoryStore::new();
        store.create_generation(generation("g1", "u1")).await.unwrap();

        store
            .transition_generation(
                "g1",
                GenerationStatus::Pending,
                GenerationStatus::Processing,
                None,
                None,
            )
            .await
            .unwrap();

        // A second Pending -> Processing attempt loses the race.
        let err = store
            .transition_generation(
                "g1",
                GenerationStatus::Pending,
                GenerationStatus::Processing,
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::StatusConflict {
                actual: GenerationStatus::Processing,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn terminal_transition_stamps_fields() {
        let store = MemoryStore::new();
        store.create_generation(generation("g1", "u1")).await.unwrap();
        store
            .transition_generation(
                "g1",
                GenerationStatus::Pending,
                GenerationStatus::Processing,
                None,
                None,
            )
            .await
            .unwrap();

        let failed = store
            .transition_generation(
                "g1",
                GenerationStatus::Processing,
                GenerationStatus::Failed,
                Some("2025-01-01T00:05:00Z".to_string()),
                Some("synthesis failed: engine unavailable".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(failed.status, GenerationStatus::Failed);
        assert_eq!(failed.completed_at.as_deref(), Some("2025-01-01T00:05:00Z"));
        assert_eq!(
            failed.error_message.as_deref(),
            Some("synthesis failed: engine unavailable")
        );
    }

    #[tokio::test]
    async fn listings_are_newest_first_and_limited() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .create_generation(generation(&format!("g{i}"), "u1"))
                .await
                .unwrap();
        }

        let all = store.list_generations("u1", 0).await.unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].id, "g4");
        assert_eq!(all[4].id, "g0");

        let limited = store.list_generations("u1", 2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].id, "g4");
    }

    #[tokio::test]
    async fn transactions_are_append_only_with_unique_ids() {
        let store = MemoryStore::new();
        let tx = TransactionRecord {
            id: "t1".to_string(),
            user_id: "u1".to_string(),
            generation_id: None,
            kind: TransactionKind::Purchase,
            token_amount: 100,
            price_usd: None,
            package_name: None,
            payment_ref: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };
        store.insert_transaction(tx.clone()).await.unwrap();
        let err = store.insert_transaction(tx).await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateTransaction { .. }));
    }

    #[tokio::test]
    async fn packages_filter_inactive_and_sort_by_display_order() {
        let store = MemoryStore::new();
        for (id, order, active) in [("p2", 2, true), ("p1", 1, true), ("p3", 3, false)] {
            store.insert_package(PackageRecord {
                id: id.to_string(),
                name: id.to_uppercase(),
                description: None,
                token_amount: 100,
                price_usd: rust_decimal::Decimal::new(999, 2),
                is_active: active,
                display_order: order,
                created_at: "2025-01-01T00:00:00Z".to_string(),
            });
        }

        let packages = store.list_active_packages().await.unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].id, "p1");
        assert_eq!(packages[1].id, "p2");
    }
}
