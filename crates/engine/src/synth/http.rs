//! HTTP synthesis backend.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime. POSTs the job to `{base_url}/synthesize`
//! and expects `{"audio_url": "..."}` back.

use async_trait::async_trait;

use super::{ArtifactRef, SynthesisError, SynthesisJob, Synthesizer};

/// Backend that submits jobs to a remote synthesis endpoint.
///
/// - `base_url` is required
/// - the bearer token comes from the constructor or the
///   `CADENZA_SYNTH_AUTH_TOKEN` env var
pub struct HttpSynthesizer {
    base_url: String,
    auth_token: Option<String>,
}

impl HttpSynthesizer {
    /// Create a backend for the given endpoint.
    ///
    /// An explicit `auth_token` wins; otherwise `CADENZA_SYNTH_AUTH_TOKEN`
    /// is consulted.
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Self {
        let auth_token =
            auth_token.or_else(|| std::env::var("CADENZA_SYNTH_AUTH_TOKEN").ok());
        HttpSynthesizer {
            base_url: base_url.into(),
            auth_token,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/synthesize", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, job: &SynthesisJob) -> Result<ArtifactRef, SynthesisError> {
        let url = self.endpoint();
        let auth_token = self.auth_token.clone();
        let job = job.clone();

        let result = tokio::task::spawn_blocking(move || {
            let agent = ureq::Agent::new_with_defaults();
            let mut request = agent.post(&url);

            if let Some(ref token) = auth_token {
                request = request.header("Authorization", &format!("Bearer {}", token));
            }

            let response = request
                .send_json(&job)
                .map_err(|e| SynthesisError::Transport {
                    message: e.to_string(),
                })?;

            let value: serde_json::Value = response.into_body().read_json().map_err(|e| {
                SynthesisError::Transport {
                    message: format!("failed to parse response as JSON: {}", e),
                }
            })?;

            match value.get("audio_url").and_then(|v| v.as_str()) {
                Some(audio_url) => Ok(ArtifactRef {
                    audio_url: audio_url.to_string(),
                }),
                None => {
                    // A well-formed rejection carries {"error": "..."}.
                    let message = value
                        .get("error")
                        .and_then(|v| v.as_str())
                        .unwrap_or("response missing audio_url")
                        .to_string();
                    Err(SynthesisError::Rejected { message })
                }
            }
        })
        .await
        .map_err(|e| SynthesisError::Transport {
            message: format!("task join error: {}", e),
        })?;

        result
    }

    fn backend_id(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_normalizes_trailing_slash() {
        let synth = HttpSynthesizer::new("https://synth.example.com/", Some("t".to_string()));
        assert_eq!(synth.endpoint(), "https://synth.example.com/synthesize");
    }

    #[test]
    fn explicit_token_wins() {
        let synth = HttpSynthesizer::new("https://synth.example.com", Some("tok".to_string()));
        assert_eq!(synth.auth_token.as_deref(), Some("tok"));
    }
}
