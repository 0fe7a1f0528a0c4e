use anyhow::Result;

use crate::models::score::{Diagnostics, Status};
use crate::models::series::TimeSeries;

/// What a strategy concludes about one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    /// Normalized score on the configured scale.
    pub score: f64,
    /// The unnormalized statistic (spike ratio, z-score, ...).
    pub raw_score: f64,
    /// `Normal` or `Trending`.
    pub status: Status,
    pub baseline_mean: f64,
    pub baseline_spread: f64,
    pub recent_mean: f64,
    pub diagnostics: Diagnostics,
}

/// A scoring algorithm.
///
/// Strategies are pure: given the two windows they return the same
/// assessment every time. The detector has already checked sample counts and
/// activity, so both windows are non-empty when `assess` is called.
pub trait ScoringStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn assess(&self, recent: &TimeSeries, baseline: &TimeSeries) -> Result<Assessment>;
}
