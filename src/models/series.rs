use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::stream::Sample;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SeriesError {
    #[error("timestamps and viewcounts must have the same length ({timestamps} vs {viewcounts})")]
    LengthMismatch { timestamps: usize, viewcounts: usize },
    #[error("timestamps must be in ascending order (index {0} goes backwards)")]
    Unordered(usize),
}

/// Viewership samples for one stream, oldest first.
///
/// Slicing never mutates: every window is a fresh `TimeSeries`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    stream_id: i64,
    external_id: String,
    timestamps: Vec<DateTime<Utc>>,
    viewcounts: Vec<u64>,
}

impl TimeSeries {
    pub fn new(
        stream_id: i64,
        external_id: impl Into<String>,
        timestamps: Vec<DateTime<Utc>>,
        viewcounts: Vec<u64>,
    ) -> Result<Self, SeriesError> {
        if timestamps.len() != viewcounts.len() {
            return Err(SeriesError::LengthMismatch {
                timestamps: timestamps.len(),
                viewcounts: viewcounts.len(),
            });
        }
        if let Some(i) = timestamps.windows(2).position(|w| w[1] < w[0]) {
            return Err(SeriesError::Unordered(i + 1));
        }
        Ok(Self {
            stream_id,
            external_id: external_id.into(),
            timestamps,
            viewcounts,
        })
    }

    pub fn empty(stream_id: i64, external_id: impl Into<String>) -> Self {
        Self {
            stream_id,
            external_id: external_id.into(),
            timestamps: Vec::new(),
            viewcounts: Vec::new(),
        }
    }

    /// Build from samples already ordered by timestamp.
    pub fn from_samples(
        stream_id: i64,
        external_id: impl Into<String>,
        samples: &[Sample],
    ) -> Result<Self, SeriesError> {
        let (timestamps, viewcounts): (Vec<_>, Vec<_>) =
            samples.iter().map(|s| (s.timestamp, s.viewcount)).unzip();
        Self::new(stream_id, external_id, timestamps, viewcounts)
    }

    pub fn stream_id(&self) -> i64 {
        self.stream_id
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn viewcounts(&self) -> &[u64] {
        &self.viewcounts
    }

    /// Viewcounts as floats, for the statistics helpers.
    pub fn values(&self) -> Vec<f64> {
        self.viewcounts.iter().map(|&v| v as f64).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.viewcounts.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.viewcounts.len()
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    pub fn latest_viewcount(&self) -> Option<u64> {
        self.viewcounts.last().copied()
    }

    /// Samples with `timestamp >= cutoff`.
    pub fn slice_recent(&self, cutoff: DateTime<Utc>) -> Self {
        let from = self.timestamps.partition_point(|t| *t < cutoff);
        self.range(from, self.timestamps.len())
    }

    /// Samples with `start <= timestamp < end`. Empty when `end <= start`.
    pub fn slice_baseline(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if end <= start {
            return Self::empty(self.stream_id, self.external_id.clone());
        }
        let from = self.timestamps.partition_point(|t| *t < start);
        let to = self.timestamps.partition_point(|t| *t < end);
        self.range(from, to)
    }

    fn range(&self, from: usize, to: usize) -> Self {
        Self {
            stream_id: self.stream_id,
            external_id: self.external_id.clone(),
            timestamps: self.timestamps[from..to].to_vec(),
            viewcounts: self.viewcounts[from..to].to_vec(),
        }
    }
}
