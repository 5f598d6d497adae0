use std::future::Future;

use cadenza_core::TransactionKind;

use super::{make_transaction, TestResult};
use crate::{RecordStore, StorageError};

pub(super) async fn run_transaction_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "transaction",
            "insert_then_list_round_trips",
            insert_then_list_round_trips(factory).await,
        ),
        TestResult::from_result(
            "transaction",
            "duplicate_id_rejected",
            duplicate_id_rejected(factory).await,
        ),
        TestResult::from_result(
            "transaction",
            "listing_is_per_user_newest_first_with_limit",
            listing_is_per_user_newest_first_with_limit(factory).await,
        ),
        TestResult::from_result(
            "transaction",
            "signed_amounts_sum_to_balance_delta",
            signed_amounts_sum_to_balance_delta(factory).await,
        ),
    ]
}

async fn insert_then_list_round_trips<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .insert_transaction(make_transaction("t1", "u1", TransactionKind::Usage, -10))
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let listed = store
        .list_transactions("u1", 0)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if listed.len() != 1 {
        return Err(format!("expected 1 transaction, got {}", listed.len()));
    }
    if listed[0].kind != TransactionKind::Usage || listed[0].token_amount != -10 {
        return Err(format!(
            "round trip mangled record: {} {}",
            listed[0].kind, listed[0].token_amount
        ));
    }
    Ok(())
}

async fn duplicate_id_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .insert_transaction(make_transaction("t1", "u1", TransactionKind::Purchase, 100))
        .await
        .map_err(|e| format!("insert: {e}"))?;

    match store
        .insert_transaction(make_transaction("t1", "u1", TransactionKind::Refund, 100))
        .await
    {
        Err(StorageError::DuplicateTransaction { .. }) => {}
        Err(e) => return Err(format!("expected DuplicateTransaction, got {e}")),
        Ok(()) => return Err("duplicate insert succeeded".to_string()),
    }

    // The original entry is untouched — transactions are never rewritten.
    let listed = store
        .list_transactions("u1", 0)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if listed.len() != 1 || listed[0].kind != TransactionKind::Purchase {
        return Err("duplicate insert mutated the log".to_string());
    }
    Ok(())
}

async fn listing_is_per_user_newest_first_with_limit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    for (id, user) in [("t1", "u1"), ("t2", "u2"), ("t3", "u1"), ("t4", "u1")] {
        store
            .insert_transaction(make_transaction(id, user, TransactionKind::Usage, -5))
            .await
            .map_err(|e| format!("insert {id}: {e}"))?;
    }

    let listed = store
        .list_transactions("u1", 0)
        .await
        .map_err(|e| format!("list: {e}"))?;
    let ids: Vec<&str> = listed.iter().map(|t| t.id.as_str()).collect();
    if ids != ["t4", "t3", "t1"] {
        return Err(format!("unexpected order: {ids:?}"));
    }

    let limited = store
        .list_transactions("u1", 2)
        .await
        .map_err(|e| format!("list limited: {e}"))?;
    if limited.len() != 2 || limited[0].id != "t4" {
        return Err("limit not applied from the newest end".to_string());
    }
    Ok(())
}

async fn signed_amounts_sum_to_balance_delta<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .insert_transaction(make_transaction("t1", "u1", TransactionKind::Purchase, 100))
        .await
        .map_err(|e| format!("insert t1: {e}"))?;
    store
        .insert_transaction(make_transaction("t2", "u1", TransactionKind::Usage, -10))
        .await
        .map_err(|e| format!("insert t2: {e}"))?;
    store
        .insert_transaction(make_transaction("t3", "u1", TransactionKind::Refund, 10))
        .await
        .map_err(|e| format!("insert t3: {e}"))?;

    let sum: i64 = store
        .list_transactions("u1", 0)
        .await
        .map_err(|e| format!("list: {e}"))?
        .iter()
        .map(|t| t.token_amount)
        .sum();
    if sum != 100 {
        return Err(format!("expected net 100, got {sum}"));
    }
    Ok(())
}
