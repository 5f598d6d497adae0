//! Usage statistics over a user's generation history.

use cadenza_core::{GenerationStatus, ModelTier};
use cadenza_storage::GenerationRecord;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Aggregates shown on the dashboard surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageStats {
    pub generation_count: usize,
    /// Net tokens spent: reservations of non-failed generations. Failed
    /// ones were refunded and do not count.
    pub tokens_used: i64,
    /// Mean seconds from creation to completion, over completed
    /// generations only. None when nothing completed.
    pub average_completion_seconds: Option<i64>,
    /// Most-used tier; ties break by tier declaration order. None when
    /// the slice is empty.
    pub favorite_model: Option<ModelTier>,
}

/// Compute usage statistics over a slice of generation records.
///
/// Callers pick the window (e.g. this month) by filtering the slice first.
pub fn usage_stats(generations: &[GenerationRecord]) -> UsageStats {
    let tokens_used = generations
        .iter()
        .filter(|g| g.status != GenerationStatus::Failed)
        .map(|g| g.tokens_reserved)
        .sum();

    let mut durations = Vec::new();
    for gen in generations {
        if let (Ok(start), Some(Ok(end))) = (
            OffsetDateTime::parse(&gen.created_at, &Rfc3339),
            gen.completed_at
                .as_deref()
                .filter(|_| gen.status == GenerationStatus::Completed)
                .map(|ts| OffsetDateTime::parse(ts, &Rfc3339)),
        ) {
            durations.push((end - start).whole_seconds());
        }
    }
    let average_completion_seconds = if durations.is_empty() {
        None
    } else {
        let sum: i64 = durations.iter().sum();
        Some((sum as f64 / durations.len() as f64).round() as i64)
    };

    let favorite_model = if generations.is_empty() {
        None
    } else {
        let mut favorite = None;
        let mut best = 0usize;
        for tier in ModelTier::ALL {
            let count = generations.iter().filter(|g| g.model == tier).count();
            // Strictly greater: earlier-declared tiers win ties.
            if count > best {
                best = count;
                favorite = Some(tier);
            }
        }
        favorite
    };

    UsageStats {
        generation_count: generations.len(),
        tokens_used,
        average_completion_seconds,
        favorite_model,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gen(
        id: &str,
        model: ModelTier,
        status: GenerationStatus,
        tokens: i64,
        created_at: &str,
        completed_at: Option<&str>,
    ) -> GenerationRecord {
        GenerationRecord {
            id: id.to_string(),
            user_id: "u1".to_string(),
            prompt: "prompt".to_string(),
            title: None,
            model,
            duration_seconds: 60,
            status,
            tokens_reserved: tokens,
            error_message: None,
            created_at: created_at.to_string(),
            completed_at: completed_at.map(str::to_string),
        }
    }

    #[test]
    fn empty_history_yields_empty_stats() {
        let stats = usage_stats(&[]);
        assert_eq!(stats.generation_count, 0);
        assert_eq!(stats.tokens_used, 0);
        assert_eq!(stats.average_completion_seconds, None);
        assert_eq!(stats.favorite_model, None);
    }

    #[test]
    fn failed_generations_do_not_count_as_spend() {
        let stats = usage_stats(&[
            gen(
                "g1",
                ModelTier::Tier1,
                GenerationStatus::Completed,
                10,
                "2025-01-01T00:00:00Z",
                Some("2025-01-01T00:00:30Z"),
            ),
            gen(
                "g2",
                ModelTier::Tier1,
                GenerationStatus::Failed,
                25,
                "2025-01-01T01:00:00Z",
                Some("2025-01-01T01:00:10Z"),
            ),
        ]);
        assert_eq!(stats.generation_count, 2);
        assert_eq!(stats.tokens_used, 10);
    }

    #[test]
    fn average_covers_completed_only() {
        let stats = usage_stats(&[
            gen(
                "g1",
                ModelTier::Tier1,
                GenerationStatus::Completed,
                10,
                "2025-01-01T00:00:00Z",
                Some("2025-01-01T00:00:20Z"),
            ),
            gen(
                "g2",
                ModelTier::Tier1,
                GenerationStatus::Completed,
                10,
                "2025-01-01T01:00:00Z",
                Some("2025-01-01T01:00:41Z"),
            ),
            gen(
                "g3",
                ModelTier::Tier1,
                GenerationStatus::Processing,
                10,
                "2025-01-01T02:00:00Z",
                None,
            ),
        ]);
        // (20 + 41) / 2 rounds to 31.
        assert_eq!(stats.average_completion_seconds, Some(31));
    }

    #[test]
    fn favorite_model_tie_breaks_by_declaration_order() {
        let stats = usage_stats(&[
            gen(
                "g1",
                ModelTier::Tier3,
                GenerationStatus::Completed,
                25,
                "2025-01-01T00:00:00Z",
                Some("2025-01-01T00:00:30Z"),
            ),
            gen(
                "g2",
                ModelTier::Tier1,
                GenerationStatus::Completed,
                10,
                "2025-01-01T01:00:00Z",
                Some("2025-01-01T01:00:30Z"),
            ),
        ]);
        // One each: Tier1 is declared first, so Tier1 wins.
        assert_eq!(stats.favorite_model, Some(ModelTier::Tier1));
    }

    #[test]
    fn favorite_model_prefers_the_majority() {
        let stats = usage_stats(&[
            gen(
                "g1",
                ModelTier::Tier2,
                GenerationStatus::Completed,
                15,
                "2025-01-01T00:00:00Z",
                Some("2025-01-01T00:00:30Z"),
            ),
            gen(
                "g2",
                ModelTier::Tier2,
                GenerationStatus::Failed,
                15,
                "2025-01-01T01:00:00Z",
                None,
            ),
            gen(
                "g3",
                ModelTier::Tier1,
                GenerationStatus::Completed,
                10,
                "2025-01-01T02:00:00Z",
                Some("2025-01-01T02:00:30Z"),
            ),
        ]);
        assert_eq!(stats.favorite_model, Some(ModelTier::Tier2));
    }
}
