use std::future::Future;

use super::{make_account, TestResult};
use crate::{RecordStore, StorageError};

pub(super) async fn run_balance_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "balance",
            "debit_decrements_and_tracks_usage",
            debit_decrements_and_tracks_usage(factory).await,
        ),
        TestResult::from_result(
            "balance",
            "debit_rejects_insufficient_balance",
            debit_rejects_insufficient_balance(factory).await,
        ),
        TestResult::from_result(
            "balance",
            "debit_to_exactly_zero_succeeds",
            debit_to_exactly_zero_succeeds(factory).await,
        ),
        TestResult::from_result(
            "balance",
            "credit_increments_and_tracks_purchases",
            credit_increments_and_tracks_purchases(factory).await,
        ),
        TestResult::from_result(
            "balance",
            "totals_are_monotonic_across_mixed_operations",
            totals_are_monotonic_across_mixed_operations(factory).await,
        ),
    ]
}

async fn debit_decrements_and_tracks_usage<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let acct = store
        .debit_balance("u1", 10)
        .await
        .map_err(|e| format!("debit: {e}"))?;
    if acct.token_balance != 90 {
        return Err(format!("expected balance 90, got {}", acct.token_balance));
    }
    if acct.total_used != 10 {
        return Err(format!("expected total_used 10, got {}", acct.total_used));
    }
    Ok(())
}

async fn debit_rejects_insufficient_balance<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_account(make_account("u1", 5))
        .await
        .map_err(|e| format!("create: {e}"))?;

    match store.debit_balance("u1", 10).await {
        Err(StorageError::InsufficientBalance {
            balance, requested, ..
        }) => {
            if balance != 5 || requested != 10 {
                return Err(format!(
                    "error carried wrong amounts: balance {balance}, requested {requested}"
                ));
            }
        }
        Err(e) => return Err(format!("expected InsufficientBalance, got {e}")),
        Ok(_) => return Err("debit beyond balance succeeded".to_string()),
    }

    // Failed condition must be a no-op.
    let acct = store.get_account("u1").await.map_err(|e| format!("get: {e}"))?;
    if acct.token_balance != 5 || acct.total_used != 0 {
        return Err(format!(
            "rejected debit mutated account: balance {}, total_used {}",
            acct.token_balance, acct.total_used
        ));
    }
    Ok(())
}

async fn debit_to_exactly_zero_succeeds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_account(make_account("u1", 10))
        .await
        .map_err(|e| format!("create: {e}"))?;

    let acct = store
        .debit_balance("u1", 10)
        .await
        .map_err(|e| format!("debit: {e}"))?;
    if acct.token_balance != 0 {
        return Err(format!("expected balance 0, got {}", acct.token_balance));
    }
    Ok(())
}

async fn credit_increments_and_tracks_purchases<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_account(make_account("u1", 0))
        .await
        .map_err(|e| format!("create: {e}"))?;

    store
        .credit_balance("u1", 500, true)
        .await
        .map_err(|e| format!("purchase credit: {e}"))?;
    let acct = store
        .credit_balance("u1", 10, false)
        .await
        .map_err(|e| format!("refund credit: {e}"))?;

    if acct.token_balance != 510 {
        return Err(format!("expected balance 510, got {}", acct.token_balance));
    }
    // Refunds do not count as purchases.
    if acct.total_purchased != 500 {
        return Err(format!(
            "expected total_purchased 500, got {}",
            acct.total_purchased
        ));
    }
    Ok(())
}

async fn totals_are_monotonic_across_mixed_operations<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let mut last_used = 0;
    let mut last_purchased = 100;
    for step in 0..4 {
        let acct = if step % 2 == 0 {
            store
                .debit_balance("u1", 10)
                .await
                .map_err(|e| format!("debit step {step}: {e}"))?
        } else {
            store
                .credit_balance("u1", 10, step == 1)
                .await
                .map_err(|e| format!("credit step {step}: {e}"))?
        };
        if acct.total_used < last_used || acct.total_purchased < last_purchased {
            return Err(format!(
                "totals regressed at step {step}: used {} (was {last_used}), purchased {} (was {last_purchased})",
                acct.total_used, acct.total_purchased
            ));
        }
        if acct.token_balance < 0 {
            return Err(format!("balance went negative: {}", acct.token_balance));
        }
        last_used = acct.total_used;
        last_purchased = acct.total_purchased;
    }
    Ok(())
}
