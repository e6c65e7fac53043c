//! Adaptive-decay scoring.
//!
//! Frequently-recalled records age more slowly: the recall counter feeds
//! a logarithmic "stickiness" factor that divides the effective age, so
//! a much-touched record keeps its recency without per-access decay
//! checkpoints. A floor on the time component keeps cold records from
//! vanishing entirely.

use crate::index::similarity_from_distance;
use crate::types::{Metadata, ScoringConfig};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Compute the final score for one search hit.
///
/// `distance` is the raw squared-Euclidean ANN distance, converted via
/// `sim = 1/(1+d)`. With `time_weight = 0` the result is exactly that
/// similarity, so scored and unscored rankings coincide.
pub fn score_hit(distance: f32, meta: &Metadata, config: &ScoringConfig, now_ts: u64) -> f32 {
    let similarity = similarity_from_distance(distance);
    if config.time_weight == 0.0 {
        return similarity;
    }

    let stickiness = 1.0 + (1.0 + meta.recall_count as f32).ln();

    let age_seconds = (now_ts as f64 - meta.timestamp as f64).max(0.0);
    let age_days = (age_seconds / SECONDS_PER_DAY) as f32;
    let effective_age = age_days / stickiness;

    let recency = 0.5f32.powf(effective_age / config.half_life_days);
    let time_component = recency.max(config.min_floor);
    let importance_mult = meta.importance.max(0.0);

    similarity * (1.0 - config.time_weight) + time_component * config.time_weight * importance_mult
}
