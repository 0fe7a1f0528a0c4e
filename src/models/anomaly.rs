use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Rejected configuration value. Raised at construction, never at scoring time.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} {reason} (got {value})")]
    Invalid {
        field: &'static str,
        reason: &'static str,
        value: String,
    },
    #[error("unknown algorithm: {0} (expected quantile/zscore)")]
    UnknownAlgorithm(String),
}

fn invalid(field: &'static str, reason: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason,
        value: value.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Quantile,
    Zscore,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quantile => "quantile",
            Self::Zscore => "zscore",
        }
    }
}

impl FromStr for Algorithm {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_lowercase().as_str() {
            "quantile" => Ok(Self::Quantile),
            "zscore" => Ok(Self::Zscore),
            other => Err(ConfigError::UnknownAlgorithm(other.to_string())),
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── raw settings ─────────────────────────────────────────────────────────────

/// Unvalidated quantile parameters, as read from a file or override store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantileSettings {
    pub baseline_percentile: f64,
    pub recent_percentile: f64,
    pub spike_threshold: f64,
    pub high_traffic_multiplier: f64,
}

impl Default for QuantileSettings {
    fn default() -> Self {
        Self {
            baseline_percentile: 75.0,
            recent_percentile: 90.0,
            spike_threshold: 1.5,
            high_traffic_multiplier: 1.2,
        }
    }
}

/// Unvalidated z-score parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZScoreSettings {
    pub zscore_threshold: f64,
    pub use_modified_zscore: bool,
    pub min_std_floor: f64,
    pub clamp_negative: bool,
}

impl Default for ZScoreSettings {
    fn default() -> Self {
        Self {
            zscore_threshold: 2.0,
            use_modified_zscore: true,
            min_std_floor: 10.0,
            clamp_negative: true,
        }
    }
}

/// Plain-data form of [`AnomalyConfig`].
///
/// Every field is public so that files, CLI flags and the override store can
/// edit it freely. Turning it into an `AnomalyConfig` is the only place
/// values are checked. Integer fields are signed on purpose: a negative
/// window should fail validation with a readable message rather than a
/// parse error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalySettings {
    pub recent_window_minutes: i64,
    pub baseline_hours: i64,
    pub min_recent_samples: i64,
    pub min_baseline_samples: i64,
    pub algorithm: String,
    pub score_min: f64,
    pub score_max: f64,
    pub logistic_midpoint: f64,
    pub logistic_steepness: f64,
    pub inactive_threshold_minutes: i64,
    pub min_viewcount: i64,
    pub quantile_params: QuantileSettings,
    pub zscore_params: ZScoreSettings,
}

impl Default for AnomalySettings {
    fn default() -> Self {
        Self {
            recent_window_minutes: 15,
            baseline_hours: 24,
            min_recent_samples: 5,
            min_baseline_samples: 1000,
            algorithm: Algorithm::Quantile.as_str().to_string(),
            score_min: 0.0,
            score_max: 100.0,
            logistic_midpoint: 0.0,
            logistic_steepness: 1.0,
            inactive_threshold_minutes: 60,
            min_viewcount: 10,
            quantile_params: QuantileSettings::default(),
            zscore_params: ZScoreSettings::default(),
        }
    }
}

impl AnomalySettings {
    /// Validate into an immutable config.
    pub fn build(self) -> Result<AnomalyConfig, ConfigError> {
        AnomalyConfig::try_from(self)
    }
}

// ── validated params ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantileParams {
    baseline_percentile: f64,
    recent_percentile: f64,
    spike_threshold: f64,
    high_traffic_multiplier: f64,
}

impl QuantileParams {
    pub fn new(
        baseline_percentile: f64,
        recent_percentile: f64,
        spike_threshold: f64,
        high_traffic_multiplier: f64,
    ) -> Result<Self, ConfigError> {
        if !(0.0..=100.0).contains(&baseline_percentile) {
            return Err(invalid(
                "quantile_params.baseline_percentile",
                "must be between 0 and 100",
                baseline_percentile,
            ));
        }
        if !(0.0..=100.0).contains(&recent_percentile) {
            return Err(invalid(
                "quantile_params.recent_percentile",
                "must be between 0 and 100",
                recent_percentile,
            ));
        }
        if !(spike_threshold >= 1.0 && spike_threshold.is_finite()) {
            return Err(invalid(
                "quantile_params.spike_threshold",
                "must be >= 1.0",
                spike_threshold,
            ));
        }
        if !(high_traffic_multiplier >= 1.0 && high_traffic_multiplier.is_finite()) {
            return Err(invalid(
                "quantile_params.high_traffic_multiplier",
                "must be >= 1.0",
                high_traffic_multiplier,
            ));
        }
        Ok(Self {
            baseline_percentile,
            recent_percentile,
            spike_threshold,
            high_traffic_multiplier,
        })
    }

    pub fn baseline_percentile(&self) -> f64 {
        self.baseline_percentile
    }
    pub fn recent_percentile(&self) -> f64 {
        self.recent_percentile
    }
    pub fn spike_threshold(&self) -> f64 {
        self.spike_threshold
    }
    /// Persisted for compatibility; the logistic score does not use it.
    pub fn high_traffic_multiplier(&self) -> f64 {
        self.high_traffic_multiplier
    }

    fn settings(&self) -> QuantileSettings {
        QuantileSettings {
            baseline_percentile: self.baseline_percentile,
            recent_percentile: self.recent_percentile,
            spike_threshold: self.spike_threshold,
            high_traffic_multiplier: self.high_traffic_multiplier,
        }
    }
}

impl Default for QuantileParams {
    fn default() -> Self {
        let s = QuantileSettings::default();
        Self {
            baseline_percentile: s.baseline_percentile,
            recent_percentile: s.recent_percentile,
            spike_threshold: s.spike_threshold,
            high_traffic_multiplier: s.high_traffic_multiplier,
        }
    }
}

impl TryFrom<QuantileSettings> for QuantileParams {
    type Error = ConfigError;
    fn try_from(s: QuantileSettings) -> Result<Self, ConfigError> {
        Self::new(
            s.baseline_percentile,
            s.recent_percentile,
            s.spike_threshold,
            s.high_traffic_multiplier,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZScoreParams {
    zscore_threshold: f64,
    use_modified_zscore: bool,
    min_std_floor: f64,
    clamp_negative: bool,
}

impl ZScoreParams {
    pub fn new(
        zscore_threshold: f64,
        use_modified_zscore: bool,
        min_std_floor: f64,
        clamp_negative: bool,
    ) -> Result<Self, ConfigError> {
        if !(zscore_threshold >= 0.0 && zscore_threshold.is_finite()) {
            return Err(invalid(
                "zscore_params.zscore_threshold",
                "must be >= 0",
                zscore_threshold,
            ));
        }
        if !(min_std_floor > 0.0 && min_std_floor.is_finite()) {
            return Err(invalid(
                "zscore_params.min_std_floor",
                "must be > 0",
                min_std_floor,
            ));
        }
        Ok(Self {
            zscore_threshold,
            use_modified_zscore,
            min_std_floor,
            clamp_negative,
        })
    }

    pub fn zscore_threshold(&self) -> f64 {
        self.zscore_threshold
    }
    pub fn use_modified_zscore(&self) -> bool {
        self.use_modified_zscore
    }
    pub fn min_std_floor(&self) -> f64 {
        self.min_std_floor
    }
    pub fn clamp_negative(&self) -> bool {
        self.clamp_negative
    }

    fn settings(&self) -> ZScoreSettings {
        ZScoreSettings {
            zscore_threshold: self.zscore_threshold,
            use_modified_zscore: self.use_modified_zscore,
            min_std_floor: self.min_std_floor,
            clamp_negative: self.clamp_negative,
        }
    }
}

impl Default for ZScoreParams {
    fn default() -> Self {
        let s = ZScoreSettings::default();
        Self {
            zscore_threshold: s.zscore_threshold,
            use_modified_zscore: s.use_modified_zscore,
            min_std_floor: s.min_std_floor,
            clamp_negative: s.clamp_negative,
        }
    }
}

impl TryFrom<ZScoreSettings> for ZScoreParams {
    type Error = ConfigError;
    fn try_from(s: ZScoreSettings) -> Result<Self, ConfigError> {
        Self::new(
            s.zscore_threshold,
            s.use_modified_zscore,
            s.min_std_floor,
            s.clamp_negative,
        )
    }
}

// ── AnomalyConfig ────────────────────────────────────────────────────────────

/// Validated, immutable detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AnomalySettings", into = "AnomalySettings")]
pub struct AnomalyConfig {
    recent_window_minutes: u32,
    baseline_hours: u32,
    min_recent_samples: usize,
    min_baseline_samples: usize,
    algorithm: Algorithm,
    score_min: f64,
    score_max: f64,
    logistic_midpoint: f64,
    logistic_steepness: f64,
    inactive_threshold_minutes: u32,
    min_viewcount: u64,
    quantile_params: QuantileParams,
    zscore_params: ZScoreParams,
}

fn at_least<T: TryFrom<i64>>(
    field: &'static str,
    value: i64,
    min: i64,
    reason: &'static str,
) -> Result<T, ConfigError> {
    if value < min {
        return Err(invalid(field, reason, value));
    }
    T::try_from(value).map_err(|_| invalid(field, "is too large", value))
}

impl TryFrom<AnomalySettings> for AnomalyConfig {
    type Error = ConfigError;

    fn try_from(s: AnomalySettings) -> Result<Self, ConfigError> {
        let recent_window_minutes: u32 =
            at_least("recent_window_minutes", s.recent_window_minutes, 5, "must be >= 5")?;
        let baseline_hours: u32 = at_least("baseline_hours", s.baseline_hours, 1, "must be >= 1")?;
        if i64::from(recent_window_minutes) >= i64::from(baseline_hours) * 60 {
            return Err(invalid(
                "recent_window_minutes",
                "must be shorter than the baseline window",
                recent_window_minutes,
            ));
        }
        let min_recent_samples: usize =
            at_least("min_recent_samples", s.min_recent_samples, 1, "must be >= 1")?;
        let min_baseline_samples: usize =
            at_least("min_baseline_samples", s.min_baseline_samples, 2, "must be >= 2")?;
        let algorithm = s.algorithm.parse::<Algorithm>()?;

        if !s.score_min.is_finite() {
            return Err(invalid("score_min", "must be finite", s.score_min));
        }
        if !s.score_max.is_finite() {
            return Err(invalid("score_max", "must be finite", s.score_max));
        }
        if s.score_min >= s.score_max {
            return Err(invalid(
                "score_min",
                "must be < score_max",
                format!("{} >= {}", s.score_min, s.score_max),
            ));
        }
        if !s.logistic_midpoint.is_finite() {
            return Err(invalid(
                "logistic_midpoint",
                "must be finite",
                s.logistic_midpoint,
            ));
        }
        if !(s.logistic_steepness > 0.0 && s.logistic_steepness.is_finite()) {
            return Err(invalid(
                "logistic_steepness",
                "must be > 0",
                s.logistic_steepness,
            ));
        }
        let inactive_threshold_minutes: u32 = at_least(
            "inactive_threshold_minutes",
            s.inactive_threshold_minutes,
            1,
            "must be >= 1",
        )?;
        let min_viewcount: u64 = at_least("min_viewcount", s.min_viewcount, 0, "must be >= 0")?;

        Ok(Self {
            recent_window_minutes,
            baseline_hours,
            min_recent_samples,
            min_baseline_samples,
            algorithm,
            score_min: s.score_min,
            score_max: s.score_max,
            logistic_midpoint: s.logistic_midpoint,
            logistic_steepness: s.logistic_steepness,
            inactive_threshold_minutes,
            min_viewcount,
            quantile_params: QuantileParams::try_from(s.quantile_params)?,
            zscore_params: ZScoreParams::try_from(s.zscore_params)?,
        })
    }
}

impl From<AnomalyConfig> for AnomalySettings {
    fn from(c: AnomalyConfig) -> Self {
        c.settings()
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            recent_window_minutes: 15,
            baseline_hours: 24,
            min_recent_samples: 5,
            min_baseline_samples: 1000,
            algorithm: Algorithm::Quantile,
            score_min: 0.0,
            score_max: 100.0,
            logistic_midpoint: 0.0,
            logistic_steepness: 1.0,
            inactive_threshold_minutes: 60,
            min_viewcount: 10,
            quantile_params: QuantileParams::default(),
            zscore_params: ZScoreParams::default(),
        }
    }
}

impl AnomalyConfig {
    /// Editable copy of this config.
    pub fn settings(&self) -> AnomalySettings {
        AnomalySettings {
            recent_window_minutes: i64::from(self.recent_window_minutes),
            baseline_hours: i64::from(self.baseline_hours),
            min_recent_samples: self.min_recent_samples as i64,
            min_baseline_samples: self.min_baseline_samples as i64,
            algorithm: self.algorithm.as_str().to_string(),
            score_min: self.score_min,
            score_max: self.score_max,
            logistic_midpoint: self.logistic_midpoint,
            logistic_steepness: self.logistic_steepness,
            inactive_threshold_minutes: i64::from(self.inactive_threshold_minutes),
            min_viewcount: self.min_viewcount as i64,
            quantile_params: self.quantile_params.settings(),
            zscore_params: self.zscore_params.settings(),
        }
    }

    pub fn recent_window_minutes(&self) -> u32 {
        self.recent_window_minutes
    }
    pub fn baseline_hours(&self) -> u32 {
        self.baseline_hours
    }
    pub fn min_recent_samples(&self) -> usize {
        self.min_recent_samples
    }
    pub fn min_baseline_samples(&self) -> usize {
        self.min_baseline_samples
    }
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
    pub fn score_min(&self) -> f64 {
        self.score_min
    }
    pub fn score_max(&self) -> f64 {
        self.score_max
    }
    pub fn logistic_midpoint(&self) -> f64 {
        self.logistic_midpoint
    }
    pub fn logistic_steepness(&self) -> f64 {
        self.logistic_steepness
    }
    pub fn inactive_threshold_minutes(&self) -> u32 {
        self.inactive_threshold_minutes
    }
    pub fn min_viewcount(&self) -> u64 {
        self.min_viewcount
    }
    pub fn quantile_params(&self) -> &QuantileParams {
        &self.quantile_params
    }
    pub fn zscore_params(&self) -> &ZScoreParams {
        &self.zscore_params
    }

    pub fn recent_window_seconds(&self) -> i64 {
        i64::from(self.recent_window_minutes) * 60
    }

    pub fn baseline_seconds(&self) -> i64 {
        i64::from(self.baseline_hours) * 3600
    }

    pub fn recent_window(&self) -> Duration {
        Duration::seconds(self.recent_window_seconds())
    }

    pub fn baseline_window(&self) -> Duration {
        Duration::seconds(self.baseline_seconds())
    }

    pub fn inactive_threshold(&self) -> Duration {
        Duration::minutes(i64::from(self.inactive_threshold_minutes))
    }
}
