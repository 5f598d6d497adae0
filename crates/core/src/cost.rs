//! Token cost model.
//!
//! Cost is a pure function of (tier, duration): duration rounds UP to whole
//! minutes, then multiplies by the tier's per-minute rate. Duration bounds
//! are a caller-side validation concern, not a cost concern -- `cost` is
//! total over all inputs.

use crate::model::ModelTier;

/// Token cost of generating `duration_seconds` of audio on `model`.
///
/// `cost(Tier1, 45) == 10` (one billable minute), `cost(Tier1, 65) == 20`
/// (two billable minutes).
pub fn cost(model: ModelTier, duration_seconds: u32) -> i64 {
    let minutes = duration_seconds.div_ceil(60) as i64;
    model.rate_per_minute() * minutes
}

/// Whether `duration_seconds` is a valid request length for `model`:
/// positive and within the tier's cap.
pub fn duration_in_bounds(model: ModelTier, duration_seconds: u32) -> bool {
    duration_seconds > 0 && duration_seconds <= model.max_duration_seconds()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_minutes_round_up() {
        assert_eq!(cost(ModelTier::Tier1, 45), 10);
        assert_eq!(cost(ModelTier::Tier1, 65), 20);
        assert_eq!(cost(ModelTier::Tier1, 60), 10);
        assert_eq!(cost(ModelTier::Tier1, 61), 20);
    }

    #[test]
    fn rates_per_tier() {
        assert_eq!(cost(ModelTier::Tier1, 120), 20);
        assert_eq!(cost(ModelTier::Tier2, 120), 30);
        assert_eq!(cost(ModelTier::Tier3, 120), 50);
    }

    #[test]
    fn cost_at_tier_caps() {
        assert_eq!(cost(ModelTier::Tier1, 240), 40);
        assert_eq!(cost(ModelTier::Tier2, 300), 75);
        assert_eq!(cost(ModelTier::Tier3, 480), 200);
    }

    #[test]
    fn bounds_reject_zero_and_over_cap() {
        assert!(!duration_in_bounds(ModelTier::Tier1, 0));
        assert!(duration_in_bounds(ModelTier::Tier1, 240));
        assert!(!duration_in_bounds(ModelTier::Tier1, 241));
        assert!(duration_in_bounds(ModelTier::Tier3, 480));
        assert!(!duration_in_bounds(ModelTier::Tier3, 481));
    }
}
