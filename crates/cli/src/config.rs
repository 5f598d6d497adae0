//! CLI configuration, loaded from an optional `cadenza.toml`.
//!
//! Every field has a default, so a missing file means a fully-seeded demo
//! session: one account with starting tokens and the standard package
//! catalog.

use std::path::Path;

use cadenza_core::ModelTier;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct StudioConfig {
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub synthesizer: SynthConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_email")]
    pub email: String,
    #[serde(default = "default_starting_tokens")]
    pub starting_tokens: i64,
    #[serde(default = "default_model")]
    pub default_model: ModelTier,
}

impl Default for AccountConfig {
    fn default() -> Self {
        AccountConfig {
            user_id: default_user_id(),
            email: default_email(),
            starting_tokens: default_starting_tokens(),
            default_model: default_model(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SynthConfig {
    /// "simulated" or "http".
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Endpoint for the http backend.
    pub base_url: Option<String>,
    /// Bearer token for the http backend; falls back to
    /// `CADENZA_SYNTH_AUTH_TOKEN`.
    pub auth_token: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        SynthConfig {
            backend: default_backend(),
            base_url: None,
            auth_token: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_user_id() -> String {
    "studio".to_string()
}

fn default_email() -> String {
    "studio@example.com".to_string()
}

fn default_starting_tokens() -> i64 {
    500
}

fn default_model() -> ModelTier {
    ModelTier::Tier1
}

fn default_backend() -> String {
    "simulated".to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

impl StudioConfig {
    /// Load from `path` when it exists; defaults otherwise.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(StudioConfig::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_missing() {
        let config = StudioConfig::load(Path::new("/nonexistent/cadenza.toml")).unwrap();
        assert_eq!(config.account.user_id, "studio");
        assert_eq!(config.account.starting_tokens, 500);
        assert_eq!(config.synthesizer.backend, "simulated");
        assert_eq!(config.synthesizer.timeout_seconds, 120);
    }

    #[test]
    fn parses_partial_files() {
        let config: StudioConfig = toml::from_str(
            r#"
            [account]
            starting_tokens = 50

            [synthesizer]
            backend = "http"
            base_url = "https://synth.example.com"
            "#,
        )
        .unwrap();
        assert_eq!(config.account.starting_tokens, 50);
        assert_eq!(config.account.user_id, "studio");
        assert_eq!(config.synthesizer.backend, "http");
        assert_eq!(
            config.synthesizer.base_url.as_deref(),
            Some("https://synth.example.com")
        );
    }

    #[test]
    fn rejects_unknown_fields() {
        let result: Result<StudioConfig, _> = toml::from_str(
            r#"
            [account]
            user = "typo"
            "#,
        );
        assert!(result.is_err());
    }
}
