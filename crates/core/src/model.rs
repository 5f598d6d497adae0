//! Core domain enums shared across every crate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A generation-quality tier. Each tier has a fixed per-minute token rate
/// and a maximum allowed track duration.
///
/// Declaration order is the canonical tier order; statistics use it as the
/// deterministic tie-break when two tiers are equally frequent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Tier1,
    Tier2,
    Tier3,
}

impl ModelTier {
    /// All tiers in canonical order.
    pub const ALL: [ModelTier; 3] = [ModelTier::Tier1, ModelTier::Tier2, ModelTier::Tier3];

    /// Token cost per whole minute of generated audio.
    pub fn rate_per_minute(self) -> i64 {
        match self {
            ModelTier::Tier1 => 10,
            ModelTier::Tier2 => 15,
            ModelTier::Tier3 => 25,
        }
    }

    /// Maximum allowed track duration for this tier, in seconds.
    pub fn max_duration_seconds(self) -> u32 {
        match self {
            ModelTier::Tier1 => 240,
            ModelTier::Tier2 => 300,
            ModelTier::Tier3 => 480,
        }
    }

    /// Human-readable name shown in listings and the studio surface.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelTier::Tier1 => "Tier 1 (Balanced)",
            ModelTier::Tier2 => "Tier 2 (High Quality)",
            ModelTier::Tier3 => "Tier 3 (Advanced)",
        }
    }

    /// Stable identifier used in records and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            ModelTier::Tier1 => "tier1",
            ModelTier::Tier2 => "tier2",
            ModelTier::Tier3 => "tier3",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a tier identifier does not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown model tier '{0}' (expected tier1, tier2, or tier3)")]
pub struct ParseTierError(pub String);

impl FromStr for ModelTier {
    type Err = ParseTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tier1" => Ok(ModelTier::Tier1),
            "tier2" => Ok(ModelTier::Tier2),
            "tier3" => Ok(ModelTier::Tier3),
            other => Err(ParseTierError(other.to_string())),
        }
    }
}

/// Lifecycle status of a generation request.
///
/// `Completed` and `Failed` are the only terminal states; there is no
/// transition out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GenerationStatus::Pending => "pending",
            GenerationStatus::Processing => "processing",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a token ledger entry.
///
/// Usage entries carry negative amounts; Purchase and Refund entries carry
/// positive amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Purchase,
    Usage,
    Refund,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Purchase => "purchase",
            TransactionKind::Usage => "usage",
            TransactionKind::Refund => "refund",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_parses_round_trip() {
        for tier in ModelTier::ALL {
            assert_eq!(tier.as_str().parse::<ModelTier>().unwrap(), tier);
        }
    }

    #[test]
    fn tier_rejects_unknown() {
        let err = "tier9".parse::<ModelTier>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown model tier 'tier9' (expected tier1, tier2, or tier3)"
        );
    }

    #[test]
    fn tier_serde_uses_snake_case() {
        let json = serde_json::to_string(&ModelTier::Tier2).unwrap();
        assert_eq!(json, "\"tier2\"");
        let back: ModelTier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ModelTier::Tier2);
    }

    #[test]
    fn terminal_states() {
        assert!(!GenerationStatus::Pending.is_terminal());
        assert!(!GenerationStatus::Processing.is_terminal());
        assert!(GenerationStatus::Completed.is_terminal());
        assert!(GenerationStatus::Failed.is_terminal());
    }

    #[test]
    fn status_serde_matches_store_strings() {
        assert_eq!(
            serde_json::to_string(&GenerationStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert_eq!(
            serde_json::to_string(&TransactionKind::Refund).unwrap(),
            "\"refund\""
        );
    }
}
