//! Scoring configuration for adaptive-decay re-ranking.

use serde::{Deserialize, Serialize};

/// Controls how raw ANN similarity is blended with time decay.
///
/// With `time_weight = 0` (the default) search scores are exactly the raw
/// similarity and the ranking is identical to an unscored search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Half-life of the recency component, in days.
    pub half_life_days: f32,
    /// Share of the final score contributed by the time component, in [0, 1].
    pub time_weight: f32,
    /// Floor on the time component so cold records never vanish entirely.
    pub min_floor: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            half_life_days: 30.0,
            time_weight: 0.0,
            min_floor: 0.0,
        }
    }
}

impl ScoringConfig {
    /// Create a config with the given time weight and default half-life.
    pub fn with_time_weight(time_weight: f32) -> Self {
        Self {
            time_weight: time_weight.clamp(0.0, 1.0),
            ..Self::default()
        }
    }

    /// Set the half-life in days.
    pub fn half_life(mut self, days: f32) -> Self {
        self.half_life_days = days;
        self
    }

    /// Set the floor on the time component.
    pub fn min_floor(mut self, floor: f32) -> Self {
        self.min_floor = floor;
        self
    }
}
