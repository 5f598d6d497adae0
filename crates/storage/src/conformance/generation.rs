use std::future::Future;

use cadenza_core::GenerationStatus;

use super::{make_generation, TestResult};
use crate::{RecordStore, StorageError};

pub(super) async fn run_generation_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "generation",
            "create_then_get_round_trips",
            create_then_get_round_trips(factory).await,
        ),
        TestResult::from_result(
            "generation",
            "duplicate_create_rejected",
            duplicate_create_rejected(factory).await,
        ),
        TestResult::from_result(
            "generation",
            "transition_walks_full_lifecycle",
            transition_walks_full_lifecycle(factory).await,
        ),
        TestResult::from_result(
            "generation",
            "transition_from_wrong_status_conflicts",
            transition_from_wrong_status_conflicts(factory).await,
        ),
        TestResult::from_result(
            "generation",
            "terminal_state_cannot_transition_again",
            terminal_state_cannot_transition_again(factory).await,
        ),
        TestResult::from_result(
            "generation",
            "title_update_applies",
            title_update_applies(factory).await,
        ),
        TestResult::from_result(
            "generation",
            "listing_is_per_user_newest_first",
            listing_is_per_user_newest_first(factory).await,
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
        .create_generation(make_generation("g1", "u1"))
        .await
        .map_err(|e| format!("create: {e}"))?;

    let gen = store
        .get_generation("g1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if gen.status != GenerationStatus::Pending {
        return Err(format!("expected Pending, got {}", gen.status));
    }
    if gen.tokens_reserved != 10 {
        return Err(format!("expected 10 reserved, got {}", gen.tokens_reserved));
    }
    if gen.completed_at.is_some() || gen.error_message.is_some() {
        return Err("fresh record carries terminal fields".to_string());
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
        .create_generation(make_generation("g1", "u1"))
        .await
        .map_err(|e| format!("create: {e}"))?;

    match store.create_generation(make_generation("g1", "u1")).await {
        Err(StorageError::DuplicateGeneration { .. }) => Ok(()),
        Err(e) => Err(format!("expected DuplicateGeneration, got {e}")),
        Ok(()) => Err("duplicate create succeeded".to_string()),
    }
}

async fn transition_walks_full_lifecycle<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_generation(make_generation("g1", "u1"))
        .await
        .map_err(|e| format!("create: {e}"))?;

    let processing = store
        .transition_generation(
            "g1",
            GenerationStatus::Pending,
            GenerationStatus::Processing,
            None,
            None,
        )
        .await
        .map_err(|e| format!("to processing: {e}"))?;
    if processing.status != GenerationStatus::Processing {
        return Err(format!("expected Processing, got {}", processing.status));
    }

    let completed = store
        .transition_generation(
            "g1",
            GenerationStatus::Processing,
            GenerationStatus::Completed,
            Some("2025-01-01T00:05:00Z".to_string()),
            None,
        )
        .await
        .map_err(|e| format!("to completed: {e}"))?;
    if completed.status != GenerationStatus::Completed {
        return Err(format!("expected Completed, got {}", completed.status));
    }
    if completed.completed_at.as_deref() != Some("2025-01-01T00:05:00Z") {
        return Err(format!("completed_at not stamped: {:?}", completed.completed_at));
    }
    Ok(())
}

async fn transition_from_wrong_status_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_generation(make_generation("g1", "u1"))
        .await
        .map_err(|e| format!("create: {e}"))?;

    // Record is Pending; a Processing -> Completed attempt must conflict.
    match store
        .transition_generation(
            "g1",
            GenerationStatus::Processing,
            GenerationStatus::Completed,
            None,
            None,
        )
        .await
    {
        Err(StorageError::StatusConflict {
            expected, actual, ..
        }) => {
            if expected != GenerationStatus::Processing || actual != GenerationStatus::Pending {
                return Err(format!("conflict carried wrong statuses: expected {expected}, actual {actual}"));
            }
        }
        Err(e) => return Err(format!("expected StatusConflict, got {e}")),
        Ok(_) => return Err("transition from wrong status succeeded".to_string()),
    }

    // The losing transition must not have mutated the record.
    let gen = store
        .get_generation("g1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if gen.status != GenerationStatus::Pending {
        return Err(format!("record mutated by losing transition: {}", gen.status));
    }
    Ok(())
}

async fn terminal_state_cannot_transition_again<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
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
    store
        .transition_generation(
            "g1",
            GenerationStatus::Processing,
            GenerationStatus::Failed,
            Some("2025-01-01T00:05:00Z".to_string()),
            Some("synthesis timed out".to_string()),
        )
        .await
        .map_err(|e| format!("to failed: {e}"))?;

    // Re-observing the terminal state must conflict, not re-apply.
    match store
        .transition_generation(
            "g1",
            GenerationStatus::Processing,
            GenerationStatus::Failed,
            None,
            None,
        )
        .await
    {
        Err(StorageError::StatusConflict { .. }) => Ok(()),
        Err(e) => Err(format!("expected StatusConflict, got {e}")),
        Ok(_) => Err("second terminal transition succeeded".to_string()),
    }
}

async fn title_update_applies<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_generation(make_generation("g1", "u1"))
        .await
        .map_err(|e| format!("create: {e}"))?;

    let renamed = store
        .set_generation_title("g1", "Evening Ambient")
        .await
        .map_err(|e| format!("rename: {e}"))?;
    if renamed.title.as_deref() != Some("Evening Ambient") {
        return Err(format!("title not applied: {:?}", renamed.title));
    }
    Ok(())
}

async fn listing_is_per_user_newest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    for (id, user) in [("g1", "u1"), ("g2", "u2"), ("g3", "u1"), ("g4", "u1")] {
        store
            .create_generation(make_generation(id, user))
            .await
            .map_err(|e| format!("create {id}: {e}"))?;
    }

    let listed = store
        .list_generations("u1", 0)
        .await
        .map_err(|e| format!("list: {e}"))?;
    let ids: Vec<&str> = listed.iter().map(|g| g.id.as_str()).collect();
    if ids != ["g4", "g3", "g1"] {
        return Err(format!("unexpected order: {ids:?}"));
    }

    let limited = store
        .list_generations("u1", 2)
        .await
        .map_err(|e| format!("list limited: {e}"))?;
    if limited.len() != 2 || limited[0].id != "g4" {
        return Err("limit not applied from the newest end".to_string());
    }
    Ok(())
}
