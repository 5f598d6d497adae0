//! External synthesis service abstraction.
//!
//! The workflow only needs one thing from a backend: given a job, yield at
//! most one terminal result -- an artifact reference or an error. The
//! bounded-wait guarantee is NOT the backend's job; the workflow wraps
//! every call in its own timeout.

pub mod http;
pub mod simulated;

use async_trait::async_trait;
use cadenza_core::ModelTier;
use serde::{Deserialize, Serialize};

pub use http::HttpSynthesizer;
pub use simulated::SimulatedSynthesizer;

/// One synthesis request as handed to a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisJob {
    pub generation_id: String,
    pub prompt: String,
    pub model: ModelTier,
    pub duration_seconds: u32,
}

/// A playable audio handle returned by a backend. Transient: the workflow
/// passes it to the session cache and never stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub audio_url: String,
}

/// Errors a synthesis backend can report.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    /// The service processed the job and declined it.
    #[error("synthesis rejected: {message}")]
    Rejected { message: String },

    /// The service could not be reached or answered garbage.
    #[error("synthesis transport error: {message}")]
    Transport { message: String },
}

/// An asynchronous audio synthesis backend.
#[async_trait]
pub trait Synthesizer: Send + Sync + 'static {
    /// Run one job to its terminal result. Implementations report each
    /// job's outcome exactly once; the caller applies its own timeout.
    async fn synthesize(&self, job: &SynthesisJob) -> Result<ArtifactRef, SynthesisError>;

    /// Returns this backend's identifier (e.g. "simulated", "http").
    fn backend_id(&self) -> &str;
}
