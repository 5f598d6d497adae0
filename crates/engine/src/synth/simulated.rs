//! Simulated synthesis backend.
//!
//! Reproduces the staged pipeline of the hosted service -- queueing,
//! generating, finalizing -- as plain delays, then hands back a fixed
//! sample artifact. Tests dial the delays to zero and can inject a
//! failure to exercise the compensation path.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use super::{ArtifactRef, SynthesisError, SynthesisJob, Synthesizer};

const SAMPLE_ARTIFACT_URL: &str =
    "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-1.mp3";

/// Names and default lengths of the simulated pipeline stages.
const STAGES: [(&str, Duration); 3] = [
    ("queued", Duration::from_secs(2)),
    ("generating", Duration::from_secs(3)),
    ("finalizing", Duration::from_secs(1)),
];

pub struct SimulatedSynthesizer {
    stage_delays: [Duration; 3],
    jitter: bool,
    failure: Option<String>,
    artifact_url: String,
}

impl Default for SimulatedSynthesizer {
    fn default() -> Self {
        SimulatedSynthesizer {
            stage_delays: [STAGES[0].1, STAGES[1].1, STAGES[2].1],
            jitter: true,
            failure: None,
            artifact_url: SAMPLE_ARTIFACT_URL.to_string(),
        }
    }
}

impl SimulatedSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-delay, zero-jitter variant for tests.
    pub fn instant() -> Self {
        SimulatedSynthesizer {
            stage_delays: [Duration::ZERO; 3],
            jitter: false,
            failure: None,
            artifact_url: SAMPLE_ARTIFACT_URL.to_string(),
        }
    }

    /// Make every job fail after the staged delays with this message.
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn with_stage_delays(mut self, delays: [Duration; 3]) -> Self {
        self.stage_delays = delays;
        self
    }

    pub fn with_artifact_url(mut self, url: impl Into<String>) -> Self {
        self.artifact_url = url.into();
        self
    }
}

#[async_trait]
impl Synthesizer for SimulatedSynthesizer {
    async fn synthesize(&self, job: &SynthesisJob) -> Result<ArtifactRef, SynthesisError> {
        for ((stage, _), delay) in STAGES.iter().zip(self.stage_delays) {
            tracing::info!(generation = %job.generation_id, stage = %stage, "synthesis stage");
            let jitter = if self.jitter && !delay.is_zero() {
                Duration::from_millis(rand::thread_rng().gen_range(0..250))
            } else {
                Duration::ZERO
            };
            tokio::time::sleep(delay + jitter).await;
        }

        if let Some(message) = &self.failure {
            return Err(SynthesisError::Rejected {
                message: message.clone(),
            });
        }

        Ok(ArtifactRef {
            audio_url: self.artifact_url.clone(),
        })
    }

    fn backend_id(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_core::ModelTier;

    fn job() -> SynthesisJob {
        SynthesisJob {
            generation_id: "gen-1".to_string(),
            prompt: "a catchy synth melody".to_string(),
            model: ModelTier::Tier1,
            duration_seconds: 60,
        }
    }

    #[tokio::test]
    async fn instant_backend_yields_sample_artifact() {
        let synth = SimulatedSynthesizer::instant();
        let artifact = synth.synthesize(&job()).await.unwrap();
        assert_eq!(artifact.audio_url, SAMPLE_ARTIFACT_URL);
    }

    #[tokio::test]
    async fn injected_failure_is_reported_as_rejection() {
        let synth = SimulatedSynthesizer::instant().failing_with("engine unavailable");
        let err = synth.synthesize(&job()).await.unwrap_err();
        assert!(matches!(err, SynthesisError::Rejected { .. }));
        assert_eq!(err.to_string(), "synthesis rejected: engine unavailable");
    }
}
