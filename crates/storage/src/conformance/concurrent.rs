use std::future::Future;
use std::sync::Arc;

use cadenza_core::GenerationStatus;

use super::{make_account, make_generation, TestResult};
use crate::{RecordStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_debits_exactly_one_wins",
            concurrent_debits_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_debits_never_underflow",
            concurrent_debits_never_underflow(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_terminal_transitions_exactly_one_wins",
            concurrent_terminal_transitions_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_debits_different_accounts_all_succeed",
            concurrent_debits_different_accounts_all_succeed(factory).await,
        ),
    ]
}

// ── Concurrent debit: exactly one wins ──────────────────────────────────────

/// N tasks race to debit 60 tokens from a balance of 100. Exactly one
/// succeeds; the rest must get InsufficientBalance. This exercises real
/// concurrency — `tokio::spawn` races against the conditional update.
async fn concurrent_debits_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    store
        .create_account(make_account("u1", 100))
        .await
        .map_err(|e| format!("create: {e}"))?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            match s.debit_balance("u1", 60).await {
                Ok(_) => Ok(true),
                Err(StorageError::InsufficientBalance { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }

    let acct = store.get_account("u1").await.map_err(|e| format!("get: {e}"))?;
    if acct.token_balance != 40 {
        return Err(format!("expected final balance 40, got {}", acct.token_balance));
    }
    Ok(())
}

// ── Concurrent debit: no underflow ──────────────────────────────────────────

/// N tasks each debit 10 from a balance of 50. Exactly five can win, and
/// at no point may the balance be observed negative.
async fn concurrent_debits_never_underflow<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    store
        .create_account(make_account("u1", 50))
        .await
        .map_err(|e| format!("create: {e}"))?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            match s.debit_balance("u1", 10).await {
                Ok(acct) => Ok(Some(acct.token_balance)),
                Err(StorageError::InsufficientBalance { .. }) => Ok(None),
                Err(e) => Err(e),
            }
        }));
    }

    let mut wins = 0usize;
    for handle in handles {
        let observed = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if let Some(balance) = observed {
            wins += 1;
            if balance < 0 {
                return Err(format!("observed negative balance {balance}"));
            }
        }
    }

    if wins != 5 {
        return Err(format!("expected exactly 5 winning debits, got {wins}"));
    }

    let acct = store.get_account("u1").await.map_err(|e| format!("get: {e}"))?;
    if acct.token_balance != 0 {
        return Err(format!("expected final balance 0, got {}", acct.token_balance));
    }
    if acct.total_used != 50 {
        return Err(format!("expected total_used 50, got {}", acct.total_used));
    }
    Ok(())
}

// ── Concurrent terminal transition: exactly one wins ────────────────────────

/// N tasks race the same Processing record to Failed. The status CAS must
/// pick exactly one winner — this is what makes terminal side effects
/// (refunds) exactly-once for callers that gate them on the transition.
async fn concurrent_terminal_transitions_exactly_one_wins<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    store
        .create_generation(make_generation("g1", "u1"))
        .await
        .map_err(|e| format!("create: {e}"))?;
    store
        .transition_generation(
            "g1",
            GenerationStatus::Pending,
            GenerationStatus::Processing,
            None,
            None,
        )
        .await
        .map_err(|e| format!("to processing: {e}"))?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            match s
                .transition_generation(
                    "g1",
                    GenerationStatus::Processing,
                    GenerationStatus::Failed,
                    Some("2025-01-01T00:05:00Z".to_string()),
                    Some(format!("failure from task {i}")),
                )
                .await
            {
                Ok(_) => Ok(true),
                Err(StorageError::StatusConflict { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    Ok(())
}

// ── Concurrent debits to different accounts: all succeed ────────────────────

/// N tasks each debit a different account. All should succeed — no false
/// conflicts when there is no contention.
async fn concurrent_debits_different_accounts_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    for i in 0..N {
        store
            .create_account(make_account(&format!("u{i}"), 100))
            .await
            .map_err(|e| format!("create u{i}: {e}"))?;
    }

    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            s.debit_balance(&format!("u{i}"), 25).await.map(|_| ())
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        handle
            .await
            .map_err(|e| format!("task {i} panic: {e}"))?
            .map_err(|e| format!("task {i} failed: {e}"))?;
    }

    for i in 0..N {
        let acct = store
            .get_account(&format!("u{i}"))
            .await
            .map_err(|e| format!("get u{i}: {e}"))?;
        if acct.token_balance != 75 {
            return Err(format!("u{i}: expected balance 75, got {}", acct.token_balance));
        }
    }
    Ok(())
}
