//! Generation Workflow state machine.
//!
//! One submission walks `Pending -> Processing -> {Completed, Failed}`,
//! with no way back out of a terminal state. The walk is an explicit
//! state-machine value ([`DriveState`]); every side effect (the status
//! write, the compensating refund, the session-track registration) hangs
//! off exactly one transition, and the store's conditional status update
//! makes each transition single-winner even under a driver race.
//!
//! Ordering per request is strict: the reservation commits before the
//! record exists; the record is Processing before synthesis starts;
//! synthesis reaches its terminal result before the terminal status write
//! and any refund; the refund lands before the failure is reported.
//!
//! The drive runs in a spawned task, so an abandoning caller (dropping the
//! handle, navigating away) never strands a debited-but-unresolved record.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cadenza_core::{cost, duration_in_bounds, GenerationStatus, ModelTier, TransactionKind};
use cadenza_storage::{
    AccountRecord, AccountSettings, GenerationRecord, PackageRecord, RecordStore, StorageError,
    TransactionRecord,
};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::error::{GenerationFailure, WorkflowError};
use crate::ids;
use crate::ledger::Ledger;
use crate::session::{SessionTrack, SessionTrackCache};
use crate::stats::{usage_stats, UsageStats};
use crate::synth::{SynthesisJob, Synthesizer};

const DEFAULT_SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(120);

/// What a caller asks for: a prompt, a tier, and a length.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub prompt: String,
    pub model: ModelTier,
    pub duration_seconds: u32,
}

/// Terminal result of one generation.
///
/// Whichever variant a caller observes, the ledger already reflects it:
/// `Failed` requests have been refunded, `Completed` ones have not.
#[derive(Debug)]
pub enum GenerationOutcome {
    Completed {
        request: GenerationRecord,
        track: SessionTrack,
    },
    Failed {
        request: GenerationRecord,
        failure: GenerationFailure,
    },
}

/// Handle to an in-flight generation.
#[derive(Debug)]
pub struct GenerationHandle {
    /// The Pending record as created at submission time.
    pub request: GenerationRecord,
    task: JoinHandle<Result<GenerationOutcome, WorkflowError>>,
}

impl GenerationHandle {
    /// Wait for the terminal outcome.
    ///
    /// Dropping the handle instead does NOT cancel the generation -- the
    /// drive task always runs to a terminal state, completing or
    /// compensating on its own.
    pub async fn outcome(self) -> Result<GenerationOutcome, WorkflowError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(WorkflowError::Internal(e.to_string())),
        }
    }
}

/// The engine: ledger + workflow + session cache over one store and one
/// synthesis backend.
pub struct GenerationEngine<S, Y> {
    store: Arc<S>,
    synth: Arc<Y>,
    ledger: Ledger<S>,
    tracks: Arc<Mutex<SessionTrackCache>>,
    synthesis_timeout: Duration,
}

impl<S: RecordStore, Y: Synthesizer> GenerationEngine<S, Y> {
    pub fn new(store: Arc<S>, synth: Arc<Y>) -> Self {
        let ledger = Ledger::new(store.clone());
        GenerationEngine {
            store,
            synth,
            ledger,
            tracks: Arc::new(Mutex::new(SessionTrackCache::new())),
            synthesis_timeout: DEFAULT_SYNTHESIS_TIMEOUT,
        }
    }

    /// Bound on how long one synthesis call may take before the workflow
    /// fails it and refunds.
    pub fn with_synthesis_timeout(mut self, timeout: Duration) -> Self {
        self.synthesis_timeout = timeout;
        self
    }

    /// Submit a generation request.
    ///
    /// Validates, reserves tokens, creates the Pending record, and spawns
    /// the drive task. Returns once the record exists; await the handle
    /// for the terminal outcome.
    pub async fn submit(
        &self,
        user_id: &str,
        params: GenerationParams,
    ) -> Result<GenerationHandle, WorkflowError> {
        let prompt = params.prompt.trim();
        if prompt.is_empty() {
            return Err(WorkflowError::InvalidRequest {
                reason: "prompt must not be empty".to_string(),
            });
        }
        if !duration_in_bounds(params.model, params.duration_seconds) {
            return Err(WorkflowError::InvalidRequest {
                reason: format!(
                    "duration {}s out of bounds for {} (1..={}s)",
                    params.duration_seconds,
                    params.model,
                    params.model.max_duration_seconds()
                ),
            });
        }

        let tokens = cost(params.model, params.duration_seconds);
        let generation_id = ids::new_id("gen");

        // The reservation is the commit point; everything after it must
        // either finish or compensate.
        self.ledger
            .reserve(user_id, tokens, Some(&generation_id))
            .await?;

        let record = GenerationRecord {
            id: generation_id,
            user_id: user_id.to_string(),
            prompt: prompt.to_string(),
            title: None,
            model: params.model,
            duration_seconds: params.duration_seconds,
            status: GenerationStatus::Pending,
            tokens_reserved: tokens,
            error_message: None,
            created_at: ids::now_rfc3339(),
            completed_at: None,
        };
        if let Err(err) = self.store.create_generation(record.clone()).await {
            // The reservation committed but the record write did not:
            // refund immediately, then surface the storage failure.
            if let Err(undo) = self
                .ledger
                .credit(user_id, tokens, TransactionKind::Refund, Some(&record.id))
                .await
            {
                tracing::error!(
                    generation = %record.id,
                    error = %undo,
                    "failed to refund after record creation failure"
                );
            }
            return Err(err.into());
        }

        tracing::info!(
            generation = %record.id,
            user = user_id,
            model = %params.model,
            tokens,
            "generation submitted"
        );

        let ctx = DriveContext {
            store: self.store.clone(),
            ledger: self.ledger.clone(),
            synth: self.synth.clone(),
            tracks: self.tracks.clone(),
            synthesis_timeout: self.synthesis_timeout,
        };
        let task = tokio::spawn(drive(ctx, record.clone()));

        Ok(GenerationHandle { request: record, task })
    }

    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    /// Shared handle to the session track cache.
    pub fn session_tracks(&self) -> Arc<Mutex<SessionTrackCache>> {
        self.tracks.clone()
    }

    /// Point the session's active selection at a track.
    pub fn select_track(&self, generation_id: &str) -> bool {
        lock_tracks(&self.tracks).select(generation_id)
    }

    /// A user's generation history, newest first. `limit` 0 = no limit.
    pub async fn history(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<GenerationRecord>, WorkflowError> {
        Ok(self.store.list_generations(user_id, limit).await?)
    }

    /// Usage statistics over generations created at or after `since`
    /// (all of them when None).
    pub async fn stats_since(
        &self,
        user_id: &str,
        since: Option<OffsetDateTime>,
    ) -> Result<UsageStats, WorkflowError> {
        let mut generations = self.store.list_generations(user_id, 0).await?;
        if let Some(cutoff) = since {
            generations.retain(|g| {
                OffsetDateTime::parse(&g.created_at, &Rfc3339)
                    .map(|ts| ts >= cutoff)
                    .unwrap_or(false)
            });
        }
        Ok(usage_stats(&generations))
    }

    /// Rename a generation in the history surface.
    pub async fn rename_generation(
        &self,
        generation_id: &str,
        title: &str,
    ) -> Result<GenerationRecord, WorkflowError> {
        Ok(self.store.set_generation_title(generation_id, title).await?)
    }

    /// Rewrite the account's preference fields.
    pub async fn update_settings(
        &self,
        user_id: &str,
        settings: AccountSettings,
    ) -> Result<AccountRecord, WorkflowError> {
        Ok(self.store.update_account_settings(user_id, settings).await?)
    }

    /// Active token packages, in display order.
    pub async fn packages(&self) -> Result<Vec<PackageRecord>, WorkflowError> {
        Ok(self.store.list_active_packages().await?)
    }

    /// Buy a package by id: credits the balance and logs the purchase.
    pub async fn purchase(
        &self,
        user_id: &str,
        package_id: &str,
    ) -> Result<AccountRecord, WorkflowError> {
        let package = self
            .store
            .list_active_packages()
            .await?
            .into_iter()
            .find(|p| p.id == package_id)
            .ok_or_else(|| WorkflowError::PackageNotFound {
                package_id: package_id.to_string(),
            })?;
        Ok(self.ledger.purchase(user_id, &package).await?)
    }

    /// The user's transaction history, newest first.
    pub async fn transactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, WorkflowError> {
        Ok(self.ledger.recent_transactions(user_id, limit).await?)
    }
}

// ──────────────────────────────────────────────
// Drive task
// ──────────────────────────────────────────────

struct DriveContext<S, Y> {
    store: Arc<S>,
    ledger: Ledger<S>,
    synth: Arc<Y>,
    tracks: Arc<Mutex<SessionTrackCache>>,
    synthesis_timeout: Duration,
}

/// The workflow as a value. Each arm of the walk consumes its state and
/// performs that transition's side effects exactly once.
enum DriveState {
    Pending(GenerationRecord),
    Processing(GenerationRecord),
    Done(GenerationOutcome),
}

async fn drive<S: RecordStore, Y: Synthesizer>(
    ctx: DriveContext<S, Y>,
    record: GenerationRecord,
) -> Result<GenerationOutcome, WorkflowError> {
    let mut state = DriveState::Pending(record);
    loop {
        state = match state {
            DriveState::Pending(record) => {
                // Pending -> Processing: synthesis may start only after
                // this write lands.
                let updated = ctx
                    .store
                    .transition_generation(
                        &record.id,
                        GenerationStatus::Pending,
                        GenerationStatus::Processing,
                        None,
                        None,
                    )
                    .await?;
                tracing::debug!(generation = %updated.id, "synthesis started");
                DriveState::Processing(updated)
            }

            DriveState::Processing(record) => {
                let job = SynthesisJob {
                    generation_id: record.id.clone(),
                    prompt: record.prompt.clone(),
                    model: record.model,
                    duration_seconds: record.duration_seconds,
                };
                let outcome =
                    match tokio::time::timeout(ctx.synthesis_timeout, ctx.synth.synthesize(&job))
                        .await
                    {
                        Ok(Ok(artifact)) => complete(&ctx, record, artifact.audio_url).await?,
                        Ok(Err(err)) => {
                            fail(
                                &ctx,
                                record,
                                GenerationFailure::Synthesis {
                                    message: err.to_string(),
                                },
                            )
                            .await?
                        }
                        Err(_elapsed) => {
                            fail(
                                &ctx,
                                record,
                                GenerationFailure::Timeout {
                                    seconds: ctx.synthesis_timeout.as_secs(),
                                },
                            )
                            .await?
                        }
                    };
                DriveState::Done(outcome)
            }

            DriveState::Done(outcome) => return Ok(outcome),
        };
    }
}

/// Processing -> Completed: stamp `completed_at`, then shelve the track.
async fn complete<S: RecordStore, Y>(
    ctx: &DriveContext<S, Y>,
    record: GenerationRecord,
    audio_url: String,
) -> Result<GenerationOutcome, WorkflowError> {
    let updated = ctx
        .store
        .transition_generation(
            &record.id,
            GenerationStatus::Processing,
            GenerationStatus::Completed,
            Some(ids::now_rfc3339()),
            None,
        )
        .await?;

    let track = {
        let mut tracks = lock_tracks(&ctx.tracks);
        let track = SessionTrack {
            generation_id: updated.id.clone(),
            title: format!("Generation {}", tracks.len() + 1),
            audio_url,
            request: updated.clone(),
        };
        tracks.add(track.clone());
        track
    };

    tracing::info!(generation = %updated.id, track = %track.title, "generation completed");
    Ok(GenerationOutcome::Completed {
        request: updated,
        track,
    })
}

/// Processing -> Failed: terminal write, then refund, then report.
///
/// Winning the status write is what licenses the refund; a driver that
/// loses the race applies nothing.
async fn fail<S: RecordStore, Y>(
    ctx: &DriveContext<S, Y>,
    record: GenerationRecord,
    failure: GenerationFailure,
) -> Result<GenerationOutcome, WorkflowError> {
    let updated = match ctx
        .store
        .transition_generation(
            &record.id,
            GenerationStatus::Processing,
            GenerationStatus::Failed,
            Some(ids::now_rfc3339()),
            Some(failure.to_string()),
        )
        .await
    {
        Ok(updated) => updated,
        Err(StorageError::StatusConflict { actual, .. }) => {
            // Another driver already owns the terminal transition and its
            // side effects; re-applying the refund here would double it.
            let current = ctx.store.get_generation(&record.id).await?;
            if actual == GenerationStatus::Failed {
                return Ok(GenerationOutcome::Failed {
                    request: current,
                    failure,
                });
            }
            return Err(WorkflowError::Internal(format!(
                "generation {} reached {} while failing",
                record.id, actual
            )));
        }
        Err(other) => {
            // The record could not be marked Failed, but the reservation
            // must still be undone before the error surfaces.
            if let Err(undo) = ctx
                .ledger
                .credit(
                    &record.user_id,
                    record.tokens_reserved,
                    TransactionKind::Refund,
                    Some(&record.id),
                )
                .await
            {
                tracing::error!(
                    generation = %record.id,
                    error = %undo,
                    "failed to refund after terminal write failure"
                );
            }
            return Err(other.into());
        }
    };

    ctx.ledger
        .credit(
            &updated.user_id,
            updated.tokens_reserved,
            TransactionKind::Refund,
            Some(&updated.id),
        )
        .await?;

    tracing::warn!(
        generation = %updated.id,
        tokens = updated.tokens_reserved,
        error = %failure,
        "generation failed; tokens refunded"
    );
    Ok(GenerationOutcome::Failed {
        request: updated,
        failure,
    })
}

fn lock_tracks(tracks: &Mutex<SessionTrackCache>) -> std::sync::MutexGuard<'_, SessionTrackCache> {
    // Recover data even if the mutex was poisoned by a panicking task
    tracks.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::SimulatedSynthesizer;
    use cadenza_storage::MemoryStore;

    async fn engine_with_balance(
        balance: i64,
    ) -> GenerationEngine<MemoryStore, SimulatedSynthesizer> {
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
        GenerationEngine::new(store, Arc::new(SimulatedSynthesizer::instant()))
    }

    #[tokio::test]
    async fn empty_prompt_rejected_before_any_side_effect() {
        let engine = engine_with_balance(100).await;
        let err = engine
            .submit(
                "u1",
                GenerationParams {
                    prompt: "   ".to_string(),
                    model: ModelTier::Tier1,
                    duration_seconds: 60,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidRequest { .. }));

        let account = engine.ledger().account("u1").await.unwrap();
        assert_eq!(account.token_balance, 100);
        assert!(engine.transactions("u1", 0).await.unwrap().is_empty());
        assert!(engine.history("u1", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn out_of_bound_duration_rejected() {
        let engine = engine_with_balance(1000).await;
        for duration in [0u32, 241] {
            let err = engine
                .submit(
                    "u1",
                    GenerationParams {
                        prompt: "a song".to_string(),
                        model: ModelTier::Tier1,
                        duration_seconds: duration,
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(err, WorkflowError::InvalidRequest { .. }));
        }
        assert!(engine.history("u1", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn track_titles_number_the_session() {
        let engine = engine_with_balance(100).await;
        for _ in 0..2 {
            let handle = engine
                .submit(
                    "u1",
                    GenerationParams {
                        prompt: "a song".to_string(),
                        model: ModelTier::Tier1,
                        duration_seconds: 60,
                    },
                )
                .await
                .unwrap();
            handle.outcome().await.unwrap();
        }

        let first_id = {
            let tracks = engine.session_tracks();
            let tracks = tracks.lock().unwrap();
            assert_eq!(tracks.len(), 2);
            // Most recent first; the newest is the active selection.
            assert_eq!(tracks.tracks()[0].title, "Generation 2");
            assert_eq!(tracks.tracks()[1].title, "Generation 1");
            assert_eq!(tracks.active().unwrap().title, "Generation 2");
            tracks.tracks()[1].generation_id.clone()
        };

        assert!(engine.select_track(&first_id));
        let tracks = engine.session_tracks();
        let tracks = tracks.lock().unwrap();
        assert_eq!(tracks.active().unwrap().title, "Generation 1");
    }
}
