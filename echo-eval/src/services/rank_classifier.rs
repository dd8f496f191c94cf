//! Rank classification against a descending threshold table

use echo_common::{RankTag, RankThresholds};

/// Tolerance on threshold comparisons so a score equal to a cutoff
/// (up to float representation error) lands on that cutoff's tag
pub const RANK_EPSILON: f64 = 1e-9;

/// Tag of the highest threshold whose minimum the score reaches
///
/// Scores below every threshold, and NaN, get the table's lowest tag.
pub fn classify(score: f64, thresholds: &RankThresholds) -> RankTag {
    thresholds
        .iter()
        .find(|threshold| score >= threshold.min_score - RANK_EPSILON)
        .map(|threshold| threshold.tag)
        .unwrap_or_else(|| thresholds.lowest_tag())
}
