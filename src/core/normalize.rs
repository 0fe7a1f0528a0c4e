//! Logistic mapping of an unbounded statistic onto the score scale.

use crate::models::anomaly::AnomalyConfig;

const EXPONENT_LIMIT: f64 = 700.0;
const SIGMOID_EPSILON: f64 = 1e-10;

/// `score_min + range / (1 + e^(-steepness * (raw - midpoint)))`.
///
/// The exponent is clamped to ±700 so `exp` never overflows; a NaN exponent
/// lands on mid-scale. The result is always inside `[score_min, score_max]`.
pub fn normalize(raw: f64, score_min: f64, score_max: f64, midpoint: f64, steepness: f64) -> f64 {
    let range = score_max - score_min;
    if range == 0.0 {
        return score_min;
    }
    let mut exponent = -steepness * (raw - midpoint);
    if exponent.is_nan() {
        exponent = 0.0;
    }
    let sigmoid = 1.0 / (1.0 + exponent.clamp(-EXPONENT_LIMIT, EXPONENT_LIMIT).exp());
    let score = score_min + range * sigmoid;
    if score_min < score_max {
        score.clamp(score_min, score_max)
    } else {
        score
    }
}

/// Inverse of [`normalize`]. Scores at or beyond the bounds are pulled in by
/// a small epsilon, so the extremes map to large but finite raw values.
pub fn inverse(score: f64, score_min: f64, score_max: f64, midpoint: f64, steepness: f64) -> f64 {
    let range = score_max - score_min;
    if range == 0.0 {
        return midpoint;
    }
    let sigmoid = ((score - score_min) / range).clamp(SIGMOID_EPSILON, 1.0 - SIGMOID_EPSILON);
    midpoint - (1.0 / steepness) * ((1.0 / sigmoid) - 1.0).ln()
}

/// The curve configured for one detection run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Logistic {
    pub score_min: f64,
    pub score_max: f64,
    pub midpoint: f64,
    pub steepness: f64,
}

impl Logistic {
    pub fn from_config(config: &AnomalyConfig) -> Self {
        Self {
            score_min: config.score_min(),
            score_max: config.score_max(),
            midpoint: config.logistic_midpoint(),
            steepness: config.logistic_steepness(),
        }
    }

    pub fn normalize(&self, raw: f64) -> f64 {
        normalize(raw, self.score_min, self.score_max, self.midpoint, self.steepness)
    }

    pub fn inverse(&self, score: f64) -> f64 {
        inverse(score, self.score_min, self.score_max, self.midpoint, self.steepness)
    }

    /// Clamp an externally produced score into this curve's bounds.
    pub fn clamp(&self, score: f64) -> f64 {
        score.clamp(self.score_min, self.score_max)
    }
}
