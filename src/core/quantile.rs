use anyhow::Result;
use serde_json::Value;

use crate::core::normalize::Logistic;
use crate::core::stats;
use crate::core::strategy::{Assessment, ScoringStrategy};
use crate::models::anomaly::{AnomalyConfig, QuantileParams};
use crate::models::score::{Diagnostics, Status};
use crate::models::series::TimeSeries;

/// Compares a high percentile of recent viewership with a percentile of the
/// baseline. `raw_score` is the spike ratio; the curve is fed `ratio - 1` so
/// that an unchanged stream sits at the curve's midpoint.
#[derive(Debug, Clone)]
pub struct QuantileStrategy {
    params: QuantileParams,
    curve: Logistic,
}

impl QuantileStrategy {
    pub fn new(config: &AnomalyConfig) -> Self {
        Self::with_params(config, *config.quantile_params())
    }

    pub fn with_params(config: &AnomalyConfig, params: QuantileParams) -> Self {
        Self {
            params,
            curve: Logistic::from_config(config),
        }
    }

    pub fn params(&self) -> &QuantileParams {
        &self.params
    }
}

impl ScoringStrategy for QuantileStrategy {
    fn name(&self) -> &str {
        "quantile"
    }

    fn assess(&self, recent: &TimeSeries, baseline: &TimeSeries) -> Result<Assessment> {
        let recent_views = recent.values();
        let baseline_views = baseline.values();

        let baseline_mean = stats::mean(&baseline_views);
        let baseline_floor = (baseline_mean * 0.01).max(1.0);
        let baseline_p =
            stats::percentile(&baseline_views, self.params.baseline_percentile()).max(baseline_floor);
        let recent_p = stats::percentile(&recent_views, self.params.recent_percentile());

        let spike_ratio = recent_p / baseline_p;
        let status = if spike_ratio >= self.params.spike_threshold() {
            Status::Trending
        } else {
            Status::Normal
        };

        let mut diagnostics = Diagnostics::new();
        diagnostics.insert("baseline_percentile".into(), Value::from(baseline_p));
        diagnostics.insert("recent_percentile".into(), Value::from(recent_p));
        diagnostics.insert("spike_ratio".into(), Value::from(spike_ratio));
        diagnostics.insert("baseline_floor".into(), Value::from(baseline_floor));
        diagnostics.insert(
            "baseline_p".into(),
            Value::from(self.params.baseline_percentile()),
        );
        diagnostics.insert("recent_p".into(), Value::from(self.params.recent_percentile()));
        diagnostics.insert(
            "spike_threshold".into(),
            Value::from(self.params.spike_threshold()),
        );

        Ok(Assessment {
            score: self.curve.normalize(spike_ratio - 1.0),
            raw_score: spike_ratio,
            status,
            baseline_mean,
            baseline_spread: stats::std_dev(&baseline_views),
            recent_mean: stats::mean(&recent_views),
            diagnostics,
        })
    }
}
