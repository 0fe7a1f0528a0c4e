use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub type Diagnostics = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Normal,
    Trending,
    InsufficientData,
    Inactive,
    Error,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Trending => "trending",
            Self::InsufficientData => "insufficient_data",
            Self::Inactive => "inactive",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one detection run for one stream.
///
/// `status` decides whether a stream is trending; `score` only orders the
/// ranking and always stays within the configured bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyScore {
    pub stream_id: i64,
    pub external_id: String,
    pub score: f64,
    pub status: Status,
    pub raw_score: Option<f64>,
    pub baseline_mean: Option<f64>,
    pub baseline_spread: Option<f64>,
    pub recent_mean: Option<f64>,
    pub algorithm: String,
    pub computed_at: DateTime<Utc>,
    pub diagnostics: Diagnostics,
    pub name: Option<String>,
    pub channel: Option<String>,
    pub current_viewcount: Option<u64>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl AnomalyScore {
    /// A result that never reached the scoring strategy.
    pub fn terminal(
        stream_id: i64,
        external_id: &str,
        status: Status,
        score: f64,
        algorithm: &str,
        reason: &str,
        computed_at: DateTime<Utc>,
    ) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.insert("reason".into(), Value::from(reason));
        Self {
            stream_id,
            external_id: external_id.to_string(),
            score,
            status,
            raw_score: None,
            baseline_mean: None,
            baseline_spread: None,
            recent_mean: None,
            algorithm: algorithm.to_string(),
            computed_at,
            diagnostics,
            name: None,
            channel: None,
            current_viewcount: None,
            last_updated: None,
        }
    }

    pub fn is_trending(&self) -> bool {
        self.status == Status::Trending
    }

    /// Whether the strategy produced a real score.
    pub fn is_valid(&self) -> bool {
        matches!(self.status, Status::Normal | Status::Trending)
    }

    pub fn reason(&self) -> Option<&str> {
        self.diagnostics.get("reason").and_then(Value::as_str)
    }

    pub fn to_record(&self) -> ScoreRecord {
        ScoreRecord {
            stream_id: self.stream_id,
            external_id: self.external_id.clone(),
            name: self.name.clone(),
            channel: self.channel.clone(),
            score: round_to(self.score, 2),
            status: self.status.as_str(),
            current_viewcount: self.current_viewcount,
            baseline_mean: self.baseline_mean.map(|v| round_to(v, 2)),
            baseline_spread: self.baseline_spread.map(|v| round_to(v, 2)),
            recent_mean: self.recent_mean.map(|v| round_to(v, 2)),
            raw_score: self.raw_score.map(|v| round_to(v, 4)),
            algorithm: self.algorithm.clone(),
            computed_at: iso8601(self.computed_at),
            last_updated: self.last_updated.map(iso8601),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

/// Flat, serializable form of an [`AnomalyScore`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoreRecord {
    pub stream_id: i64,
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub score: f64,
    pub status: &'static str,
    pub current_viewcount: Option<u64>,
    pub baseline_mean: Option<f64>,
    pub baseline_spread: Option<f64>,
    pub recent_mean: Option<f64>,
    pub raw_score: Option<f64>,
    pub algorithm: String,
    pub computed_at: String,
    pub last_updated: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub diagnostics: Diagnostics,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn iso8601(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}
