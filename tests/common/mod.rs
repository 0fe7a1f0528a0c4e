#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use streamrank::db::Database;
use streamrank::models::anomaly::AnomalySettings;
use streamrank::models::series::TimeSeries;
use streamrank::models::stream::{Livestream, Sample};
use tempfile::TempDir;

/// Create a temporary database for testing.
pub fn setup_db() -> (TempDir, Database) {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("test.db");
    let db = Database::open(&db_path).unwrap();
    (dir, db)
}

/// Reference "now" shared by detector tests.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Settings small enough for hand-built series: 15 min recent window,
/// 1 h baseline, 3 recent and 5 baseline samples required.
pub fn small_settings() -> AnomalySettings {
    AnomalySettings {
        baseline_hours: 1,
        min_recent_samples: 3,
        min_baseline_samples: 5,
        min_viewcount: 10,
        ..AnomalySettings::default()
    }
}

/// One sample per minute, the last one `end_minutes_ago` before `now()`.
pub fn samples_ending(end_minutes_ago: i64, counts: &[u64]) -> Vec<Sample> {
    let n = counts.len() as i64;
    counts
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let minutes_ago = end_minutes_ago + (n - 1 - i as i64);
            Sample::new(now() - Duration::minutes(minutes_ago), c)
        })
        .collect()
}

/// Baseline samples in the hour before the recent window followed by recent
/// samples in the last few minutes.
pub fn baseline_then_recent(baseline: &[u64], recent: &[u64]) -> Vec<Sample> {
    let mut samples = samples_ending(20, baseline);
    samples.extend(samples_ending(0, recent));
    samples
}

pub fn series(counts: &[u64]) -> TimeSeries {
    TimeSeries::from_samples(1, "abcdefghijk", &samples_ending(0, counts)).unwrap()
}

/// Insert a live stream with the given video id.
pub fn add_stream(db: &Database, external_id: &str, name: &str) -> Livestream {
    db.insert_stream(&Livestream::new(external_id, name, "Test Channel"))
        .unwrap()
}

/// In-memory source with optional per-stream fetch failures and panics.
#[derive(Default)]
pub struct MemorySource {
    pub streams: Vec<Livestream>,
    pub samples: std::collections::HashMap<i64, Vec<Sample>>,
    pub failing: std::collections::HashSet<i64>,
    pub panicking: std::collections::HashSet<i64>,
}

impl MemorySource {
    pub fn add(&mut self, id: i64, external_id: &str, samples: Vec<Sample>) {
        let mut stream = Livestream::new(external_id, &format!("Stream {}", id), "Test Channel");
        stream.id = id;
        self.streams.push(stream);
        self.samples.insert(id, samples);
    }
}

impl streamrank::core::detector::ViewershipSource for MemorySource {
    fn live_streams(&self) -> anyhow::Result<Vec<Livestream>> {
        Ok(self.streams.iter().filter(|s| s.is_live).cloned().collect())
    }

    fn stream(&self, id: i64) -> anyhow::Result<Option<Livestream>> {
        Ok(self.streams.iter().find(|s| s.id == id).cloned())
    }

    fn fetch_series(
        &self,
        stream: &Livestream,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<TimeSeries> {
        if self.failing.contains(&stream.id) {
            anyhow::bail!("connection reset");
        }
        if self.panicking.contains(&stream.id) {
            panic!("source crashed on stream {}", stream.id);
        }
        let samples: Vec<Sample> = self
            .samples
            .get(&stream.id)
            .map(|all| {
                all.iter()
                    .filter(|s| s.timestamp >= start && s.timestamp <= end)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        Ok(TimeSeries::from_samples(
            stream.id,
            stream.external_id.as_str(),
            &samples,
        )?)
    }
}
