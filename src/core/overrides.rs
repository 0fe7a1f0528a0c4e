//! Runtime overrides of detection settings, addressed by dot-notation keys
//! (`quantile_params.spike_threshold`) and persisted as strings.

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::models::anomaly::{AnomalyConfig, AnomalySettings, ConfigError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Int,
    Float,
    Bool,
    Str,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Str => "str",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

/// Canonical string form, as stored.
impl std::fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Str(v) => f.write_str(v),
        }
    }
}

/// One overridable setting.
pub struct ConfigKey {
    pub key: &'static str,
    pub value_type: ValueType,
    pub description: &'static str,
    get: fn(&AnomalySettings) -> ConfigValue,
    set: fn(&mut AnomalySettings, ConfigValue),
}

impl ConfigKey {
    pub fn get(&self, settings: &AnomalySettings) -> ConfigValue {
        (self.get)(settings)
    }

    /// Values of another type are ignored; `parse_value` never produces them.
    pub fn set(&self, settings: &mut AnomalySettings, value: ConfigValue) {
        (self.set)(settings, value)
    }
}

impl std::fmt::Debug for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigKey")
            .field("key", &self.key)
            .field("value_type", &self.value_type)
            .finish()
    }
}

macro_rules! key {
    ($key:literal, $variant:ident, $($field:ident).+, $desc:literal) => {
        ConfigKey {
            key: $key,
            value_type: ValueType::$variant,
            description: $desc,
            get: |s| ConfigValue::$variant(s.$($field).+.clone()),
            set: |s, v| {
                if let ConfigValue::$variant(v) = v {
                    s.$($field).+ = v;
                }
            },
        }
    };
}

static KEYS: &[ConfigKey] = &[
    key!("recent_window_minutes", Int, recent_window_minutes, "Length of the recent window in minutes"),
    key!("baseline_hours", Int, baseline_hours, "Length of the baseline window in hours"),
    key!("min_recent_samples", Int, min_recent_samples, "Samples required in the recent window"),
    key!("min_baseline_samples", Int, min_baseline_samples, "Samples required in the baseline window"),
    key!("algorithm", Str, algorithm, "Scoring strategy name"),
    key!("score_min", Float, score_min, "Lower bound of the score scale"),
    key!("score_max", Float, score_max, "Upper bound of the score scale"),
    key!("logistic_midpoint", Float, logistic_midpoint, "Raw value mapped to mid-scale"),
    key!("logistic_steepness", Float, logistic_steepness, "Slope of the logistic curve"),
    key!("inactive_threshold_minutes", Int, inactive_threshold_minutes, "Minutes without samples before a stream is inactive"),
    key!("min_viewcount", Int, min_viewcount, "Recent peak below this is inactive"),
    key!("quantile_params.baseline_percentile", Float, quantile_params.baseline_percentile, "Baseline percentile"),
    key!("quantile_params.recent_percentile", Float, quantile_params.recent_percentile, "Recent percentile"),
    key!("quantile_params.spike_threshold", Float, quantile_params.spike_threshold, "Spike ratio that counts as trending"),
    key!("quantile_params.high_traffic_multiplier", Float, quantile_params.high_traffic_multiplier, "Reserved traffic multiplier"),
    key!("zscore_params.zscore_threshold", Float, zscore_params.zscore_threshold, "Z-score that counts as trending"),
    key!("zscore_params.use_modified_zscore", Bool, zscore_params.use_modified_zscore, "Use median and MAD instead of mean and std"),
    key!("zscore_params.min_std_floor", Float, zscore_params.min_std_floor, "Lower bound for the baseline spread"),
    key!("zscore_params.clamp_negative", Bool, zscore_params.clamp_negative, "Treat drops below baseline as zero"),
];

#[derive(Debug, Error)]
pub enum OverrideError {
    #[error("unknown config key '{key}'. Valid keys: {valid}")]
    UnknownKey { key: String, valid: String },
    #[error("invalid value '{value}' for {key}: expected {expected}")]
    InvalidValue {
        key: String,
        expected: ValueType,
        value: String,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// A stored override row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredOverride {
    pub key: String,
    pub value_type: String,
    pub value: String,
}

/// Persistence for overrides.
pub trait OverrideStore {
    fn overrides(&self) -> anyhow::Result<Vec<StoredOverride>>;

    /// Insert or replace.
    fn put_override(&self, key: &str, value_type: ValueType, value: &str) -> anyhow::Result<()>;

    /// Returns whether a row was removed.
    fn delete_override(&self, key: &str) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigEntry {
    pub key: &'static str,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub value: ConfigValue,
    pub is_default: bool,
}

pub fn keys() -> &'static [ConfigKey] {
    KEYS
}

pub fn lookup(key: &str) -> Result<&'static ConfigKey, OverrideError> {
    KEYS.iter()
        .find(|k| k.key == key)
        .ok_or_else(|| OverrideError::UnknownKey {
            key: key.to_string(),
            valid: KEYS.iter().map(|k| k.key).collect::<Vec<_>>().join(", "),
        })
}

/// Parse `raw` as `value_type`. Booleans accept true/false/1/0/yes/no.
pub fn parse_value(raw: &str, value_type: ValueType) -> Option<ConfigValue> {
    let raw = raw.trim();
    match value_type {
        ValueType::Int => raw.parse().ok().map(ConfigValue::Int),
        ValueType::Float => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(ConfigValue::Float),
        ValueType::Bool => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(ConfigValue::Bool(true)),
            "false" | "0" | "no" => Some(ConfigValue::Bool(false)),
            _ => None,
        },
        ValueType::Str => Some(ConfigValue::Str(raw.to_string())),
    }
}

fn parse_for(key: &ConfigKey, raw: &str) -> Result<ConfigValue, OverrideError> {
    parse_value(raw, key.value_type).ok_or_else(|| OverrideError::InvalidValue {
        key: key.key.to_string(),
        expected: key.value_type,
        value: raw.to_string(),
    })
}

/// `base` with every usable stored override applied. Rows naming unknown
/// keys or holding unparsable values are skipped.
pub fn effective_settings(
    store: &dyn OverrideStore,
    base: &AnomalySettings,
) -> anyhow::Result<AnomalySettings> {
    let mut settings = base.clone();
    for row in store.overrides()? {
        let Ok(key) = lookup(&row.key) else {
            warn!(key = %row.key, "skipping override for unknown key");
            continue;
        };
        match parse_for(key, &row.value) {
            Ok(value) => key.set(&mut settings, value),
            Err(_) => warn!(key = %row.key, value = %row.value, "skipping unparsable override"),
        }
    }
    Ok(settings)
}

/// Validated config from `base` plus stored overrides.
pub fn build_config(
    store: &dyn OverrideStore,
    base: &AnomalySettings,
) -> Result<AnomalyConfig, OverrideError> {
    Ok(effective_settings(store, base)?.build()?)
}

/// Every key with its effective value.
pub fn list(store: &dyn OverrideStore, base: &AnomalySettings) -> Result<Vec<ConfigEntry>, OverrideError> {
    let stored: Vec<String> = store.overrides()?.into_iter().map(|r| r.key).collect();
    let settings = effective_settings(store, base)?;
    Ok(KEYS
        .iter()
        .map(|k| ConfigEntry {
            key: k.key,
            value_type: k.value_type,
            value: k.get(&settings),
            is_default: !stored.iter().any(|s| s == k.key),
        })
        .collect())
}

pub fn get(store: &dyn OverrideStore, base: &AnomalySettings, key: &str) -> Result<ConfigEntry, OverrideError> {
    let key = lookup(key)?;
    let stored = store.overrides()?.iter().any(|r| r.key == key.key);
    let settings = effective_settings(store, base)?;
    Ok(ConfigEntry {
        key: key.key,
        value_type: key.value_type,
        value: key.get(&settings),
        is_default: !stored,
    })
}

/// Store an override. The value must parse as the key's type and the
/// resulting config must still validate.
pub fn set(
    store: &dyn OverrideStore,
    base: &AnomalySettings,
    key: &str,
    raw: &str,
) -> Result<ConfigEntry, OverrideError> {
    let key = lookup(key)?;
    let value = match parse_for(key, raw)? {
        ConfigValue::Str(s) if key.key == "algorithm" => ConfigValue::Str(s.to_lowercase()),
        v => v,
    };

    let mut settings = effective_settings(store, base)?;
    key.set(&mut settings, value.clone());
    settings.build()?;

    store.put_override(key.key, key.value_type, &value.to_string())?;
    Ok(ConfigEntry {
        key: key.key,
        value_type: key.value_type,
        value,
        is_default: false,
    })
}

/// Drop an override; the key reverts to its base value.
pub fn reset(store: &dyn OverrideStore, base: &AnomalySettings, key: &str) -> Result<ConfigEntry, OverrideError> {
    let key = lookup(key)?;
    store.delete_override(key.key)?;
    Ok(ConfigEntry {
        key: key.key,
        value_type: key.value_type,
        value: key.get(base),
        is_default: true,
    })
}
