use anyhow::Result;
use serde_json::Value;

use crate::core::normalize::Logistic;
use crate::core::stats;
use crate::core::strategy::{Assessment, ScoringStrategy};
use crate::models::anomaly::{AnomalyConfig, ZScoreParams};
use crate::models::score::{Diagnostics, Status};
use crate::models::series::TimeSeries;

/// σ ≈ 1.4826 · MAD for normally distributed data.
pub const MAD_SCALE: f64 = 1.4826;

/// Modified z-score constant (≈ 1 / 1.4826).
pub const MODIFIED_Z: f64 = 0.6745;

/// Percentile of the recent window taken as its representative value.
const RECENT_PERCENTILE: f64 = 90.0;

/// Distance of recent viewership above the baseline center, in standard
/// deviations (or MAD equivalents when `use_modified_zscore` is set).
#[derive(Debug, Clone)]
pub struct ZScoreStrategy {
    params: ZScoreParams,
    curve: Logistic,
}

struct Distance {
    z: f64,
    center: f64,
    spread: f64,
}

impl ZScoreStrategy {
    pub fn new(config: &AnomalyConfig) -> Self {
        Self::with_params(config, *config.zscore_params())
    }

    pub fn with_params(config: &AnomalyConfig, params: ZScoreParams) -> Self {
        Self {
            params,
            curve: Logistic::from_config(config),
        }
    }

    pub fn params(&self) -> &ZScoreParams {
        &self.params
    }

    fn standard(&self, recent_value: f64, baseline: &[f64]) -> Distance {
        let center = stats::mean(baseline);
        let spread = stats::std_dev(baseline).max(self.params.min_std_floor());
        Distance {
            z: (recent_value - center) / spread,
            center,
            spread,
        }
    }

    fn modified(&self, recent_value: f64, baseline: &[f64]) -> Distance {
        let center = stats::median(baseline);
        let spread = stats::mad(baseline).max(self.params.min_std_floor() / MAD_SCALE);
        Distance {
            z: MODIFIED_Z * (recent_value - center) / spread,
            center,
            spread,
        }
    }
}

impl ScoringStrategy for ZScoreStrategy {
    fn name(&self) -> &str {
        "zscore"
    }

    fn assess(&self, recent: &TimeSeries, baseline: &TimeSeries) -> Result<Assessment> {
        let recent_views = recent.values();
        let baseline_views = baseline.values();

        let recent_value = stats::percentile(&recent_views, RECENT_PERCENTILE);
        let distance = if self.params.use_modified_zscore() {
            self.modified(recent_value, &baseline_views)
        } else {
            self.standard(recent_value, &baseline_views)
        };

        let z = if self.params.clamp_negative() && distance.z < 0.0 {
            0.0
        } else {
            distance.z
        };
        let status = if z >= self.params.zscore_threshold() {
            Status::Trending
        } else {
            Status::Normal
        };

        let mut diagnostics = Diagnostics::new();
        diagnostics.insert("zscore".into(), Value::from(distance.z));
        diagnostics.insert("center".into(), Value::from(distance.center));
        diagnostics.insert("spread".into(), Value::from(distance.spread));
        diagnostics.insert("recent_value".into(), Value::from(recent_value));
        diagnostics.insert(
            "use_modified".into(),
            Value::from(self.params.use_modified_zscore()),
        );
        diagnostics.insert(
            "zscore_threshold".into(),
            Value::from(self.params.zscore_threshold()),
        );

        Ok(Assessment {
            score: self.curve.normalize(z),
            raw_score: z,
            status,
            baseline_mean: stats::mean(&baseline_views),
            baseline_spread: stats::std_dev(&baseline_views),
            recent_mean: stats::mean(&recent_views),
            diagnostics,
        })
    }
}
