use std::future::Future;

use cadenza_core::ModelTier;

use super::{make_account, TestResult};
use crate::{AccountSettings, RecordStore, StorageError};

pub(super) async fn run_account_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "account",
            "create_then_get_round_trips",
            create_then_get_round_trips(factory).await,
        ),
        TestResult::from_result(
            "account",
            "duplicate_create_rejected",
            duplicate_create_rejected(factory).await,
        ),
        TestResult::from_result(
            "account",
            "missing_account_not_found",
            missing_account_not_found(factory).await,
        ),
        TestResult::from_result(
            "account",
            "settings_update_leaves_balance_untouched",
            settings_update_leaves_balance_untouched(factory).await,
        ),
    ]
}

async fn create_then_get_round_trips<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_account(make_account("u1", 100))
        .await
        .map_err(|e| format!("create: {e}"))?;

    let acct = store.get_account("u1").await.map_err(|e| format!("get: {e}"))?;
    if acct.token_balance != 100 {
        return Err(format!("expected balance 100, got {}", acct.token_balance));
    }
    if acct.email != "u1@example.com" {
        return Err(format!("unexpected email: {}", acct.email));
    }
    Ok(())
}

async fn duplicate_create_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_account(make_account("u1", 100))
        .await
        .map_err(|e| format!("create: {e}"))?;

    match store.create_account(make_account("u1", 5)).await {
        Err(StorageError::DuplicateAccount { .. }) => {}
        Err(e) => return Err(format!("expected DuplicateAccount, got {e}")),
        Ok(()) => return Err("duplicate create succeeded".to_string()),
    }

    // The losing create must not have clobbered the original.
    let acct = store.get_account("u1").await.map_err(|e| format!("get: {e}"))?;
    if acct.token_balance != 100 {
        return Err(format!(
            "duplicate create mutated balance: {}",
            acct.token_balance
        ));
    }
    Ok(())
}

async fn missing_account_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.get_account("nobody").await {
        Err(StorageError::AccountNotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected AccountNotFound, got {e}")),
        Ok(_) => Err("read of missing account succeeded".to_string()),
    }
}

async fn settings_update_leaves_balance_untouched<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_account(make_account("u1", 100))
        .await
        .map_err(|e| format!("create: {e}"))?;

    let updated = store
        .update_account_settings(
            "u1",
            AccountSettings {
                display_name: Some("Renamed".to_string()),
                default_model: ModelTier::Tier3,
                auto_download: true,
                email_notifications: false,
            },
        )
        .await
        .map_err(|e| format!("update: {e}"))?;

    if updated.display_name.as_deref() != Some("Renamed") {
        return Err(format!("display_name not applied: {:?}", updated.display_name));
    }
    if updated.default_model != ModelTier::Tier3 {
        return Err("default_model not applied".to_string());
    }
    if !updated.auto_download || updated.email_notifications {
        return Err("preference flags not applied".to_string());
    }
    if updated.token_balance != 100 || updated.total_purchased != 100 || updated.total_used != 0 {
        return Err("settings update touched balance fields".to_string());
    }
    Ok(())
}
