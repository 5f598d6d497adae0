//! Cadenza generation engine -- the token-metered generation workflow.
//!
//! The engine coordinates four pieces around a [`RecordStore`](cadenza_storage::RecordStore):
//!
//! - the [`Ledger`](ledger::Ledger), which owns every balance mutation and
//!   the append-only transaction log;
//! - the generation [`workflow`], an explicit state machine that reserves
//!   tokens, drives a request through the external synthesizer, and
//!   compensates the reservation when synthesis fails;
//! - the [`session`] track cache, the process-local shelf of playable
//!   results (audio is deliberately never persisted);
//! - the [`synth`] collaborator trait with simulated and HTTP backends.
//!
//! Key invariant: once a request is observed in a terminal state, the
//! ledger already reflects the true outcome. A `Failed` request has been
//! refunded; a `Completed` one has not.

mod error;
mod ids;
pub mod ledger;
pub mod session;
pub mod stats;
pub mod synth;
pub mod workflow;

pub use error::{GenerationFailure, LedgerError, WorkflowError};
pub use ledger::Ledger;
pub use session::{SessionTrack, SessionTrackCache};
pub use stats::{usage_stats, UsageStats};
pub use synth::{ArtifactRef, SynthesisError, SynthesisJob, Synthesizer};
pub use workflow::{GenerationEngine, GenerationHandle, GenerationOutcome, GenerationParams};
