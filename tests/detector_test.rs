mod common;

use anyhow::Result;
use chrono::Duration;
use common::{MemorySource, baseline_then_recent, now, samples_ending, setup_db, small_settings};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use streamrank::core::detector::{CancelToken, Detector, FixedClock, ViewershipSource};
use streamrank::core::factory::{FactoryError, StrategyRegistry};
use streamrank::core::strategy::{Assessment, ScoringStrategy};
use streamrank::models::anomaly::{AnomalyConfig, AnomalySettings};
use streamrank::models::score::{Diagnostics, Status};
use streamrank::models::series::TimeSeries;

fn config() -> AnomalyConfig {
    small_settings().build().unwrap()
}

/// Counts calls and returns a fixed score.
struct Fixed {
    score: f64,
    calls: Arc<AtomicUsize>,
}

impl ScoringStrategy for Fixed {
    fn name(&self) -> &str {
        "fixed"
    }

    fn assess(&self, _recent: &TimeSeries, _baseline: &TimeSeries) -> Result<Assessment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Assessment {
            score: self.score,
            raw_score: self.score,
            status: Status::Normal,
            baseline_mean: 0.0,
            baseline_spread: 0.0,
            recent_mean: 0.0,
            diagnostics: Diagnostics::new(),
        })
    }
}

fn fixed(score: f64) -> (Box<dyn ScoringStrategy>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (
        Box::new(Fixed {
            score,
            calls: calls.clone(),
        }),
        calls,
    )
}

/// Three live streams: one tripled, one steady, one with no samples.
fn mixed_source() -> MemorySource {
    let mut source = MemorySource::default();
    source.add(1, "steadystrm1", baseline_then_recent(&[1000; 10], &[1000; 4]));
    source.add(2, "spikystrm02", baseline_then_recent(&[1000; 10], &[3000; 4]));
    source.add(3, "emptystrm03", Vec::new());
    source
}

#[test]
fn test_zero_recent_viewers_is_inactive_without_scoring() {
    let mut source = MemorySource::default();
    source.add(1, "abcdefghijk", baseline_then_recent(&[1000; 10], &[0, 0, 0]));
    let (strategy, calls) = fixed(99.0);
    let clock = FixedClock(now());
    let detector = Detector::with_strategy(config(), &source, strategy).clock(&clock);

    let score = detector.detect_for_stream(1);
    assert_eq!(score.status, Status::Inactive);
    assert_eq!(score.score, 0.0);
    assert_eq!(score.reason(), Some("no viewers in recent window"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_steady_and_spiking_streams() {
    let source = mixed_source();
    let clock = FixedClock(now());
    let detector = Detector::new(config(), &source).unwrap().clock(&clock);

    let steady = detector.detect_for_stream(1);
    assert_eq!(steady.status, Status::Normal);
    assert_eq!(steady.score, 50.0);
    assert_eq!(steady.raw_score, Some(1.0));
    assert_eq!(steady.baseline_mean, Some(1000.0));

    let spiky = detector.detect_for_stream(2);
    assert_eq!(spiky.status, Status::Trending);
    assert_eq!(spiky.raw_score, Some(3.0));
    assert!(spiky.score > 85.0);
    assert_eq!(spiky.algorithm, "quantile");
}

#[test]
fn test_ranking_sorted_by_score() {
    let source = mixed_source();
    let clock = FixedClock(now());
    let detector = Detector::new(config(), &source).unwrap().clock(&clock);

    let ranked = detector.detect_all_live(None).unwrap();
    let ids: Vec<i64> = ranked.iter().map(|s| s.stream_id).collect();
    assert_eq!(ids, vec![2, 1, 3]);
    assert_eq!(ranked[2].status, Status::Inactive);
    assert_eq!(ranked[2].reason(), Some("no viewership data found"));
    for pair in ranked.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn test_limit_returns_prefix() {
    let source = mixed_source();
    let clock = FixedClock(now());
    let detector = Detector::new(config(), &source).unwrap().clock(&clock);

    let all = detector.detect_all_live(None).unwrap();
    let top = detector.detect_all_live(Some(2)).unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[..], all[..2]);

    let more = detector.detect_all_live(Some(10)).unwrap();
    assert_eq!(more.len(), 3);
    assert_eq!(more, all);
}

#[test]
fn test_ties_keep_source_order() {
    let mut source = MemorySource::default();
    for (id, key) in [(1, "tiestream01"), (2, "tiestream02"), (3, "tiestream03")] {
        source.add(id, key, baseline_then_recent(&[500; 10], &[500; 4]));
    }
    let clock = FixedClock(now());
    let detector = Detector::new(config(), &source).unwrap().clock(&clock).workers(3);

    let ids: Vec<i64> = detector
        .detect_all_live(None)
        .unwrap()
        .iter()
        .map(|s| s.stream_id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_failing_fetch_isolated_to_one_stream() {
    let mut source = mixed_source();
    source.failing.insert(1);
    let clock = FixedClock(now());
    let detector = Detector::new(config(), &source).unwrap().clock(&clock);

    let ranked = detector.detect_all_live(None).unwrap();
    assert_eq!(ranked.len(), 3);
    let failed = ranked.iter().find(|s| s.stream_id == 1).unwrap();
    assert_eq!(failed.status, Status::Error);
    assert_eq!(failed.score, 0.0);
    assert!(failed.reason().unwrap().contains("connection reset"));
    assert_eq!(ranked[0].stream_id, 2);
    assert_eq!(ranked[0].status, Status::Trending);
}

#[test]
fn test_panicking_fetch_isolated_to_one_stream() {
    let mut source = mixed_source();
    source.panicking.insert(1);
    let clock = FixedClock(now());
    let detector = Detector::new(config(), &source).unwrap().clock(&clock).workers(2);

    let ranked = detector.detect_all_live(None).unwrap();
    assert_eq!(ranked.len(), 3);
    let failed = ranked.iter().find(|s| s.stream_id == 1).unwrap();
    assert_eq!(failed.status, Status::Error);
    assert_eq!(failed.reason(), Some("detection panicked for stream 1"));
    assert_eq!(failed.name.as_deref(), Some("Stream 1"));
    assert_eq!(ranked[0].stream_id, 2);
    assert_eq!(ranked[0].status, Status::Trending);
}

#[test]
fn test_oversized_baseline_window_is_error_per_stream() {
    let source = mixed_source();
    let config = AnomalySettings {
        baseline_hours: 3_000_000_000,
        ..small_settings()
    }
    .build()
    .unwrap();
    let clock = FixedClock(now());
    let detector = Detector::new(config, &source).unwrap().clock(&clock);

    let ranked = detector.detect_all_live(None).unwrap();
    assert_eq!(ranked.len(), 3);
    for score in &ranked {
        assert_eq!(score.status, Status::Error);
        assert!(score.reason().unwrap().contains("baseline window"));
    }
}

#[test]
fn test_unknown_stream_is_error() {
    let source = mixed_source();
    let detector = Detector::new(config(), &source).unwrap();
    let score = detector.detect_for_stream(999);
    assert_eq!(score.status, Status::Error);
    assert_eq!(score.reason(), Some("stream not found"));
    assert_eq!(score.stream_id, 999);
}

#[test]
fn test_too_few_recent_samples() {
    let mut source = MemorySource::default();
    source.add(1, "abcdefghijk", baseline_then_recent(&[1000; 10], &[1000, 1000]));
    let clock = FixedClock(now());
    let detector = Detector::new(config(), &source).unwrap().clock(&clock);

    let score = detector.detect_for_stream(1);
    assert_eq!(score.status, Status::InsufficientData);
    assert_eq!(score.diagnostics["recent_samples"].as_u64(), Some(2));
}

#[test]
fn test_too_few_baseline_samples() {
    let mut source = MemorySource::default();
    source.add(1, "abcdefghijk", baseline_then_recent(&[1000; 3], &[1000; 4]));
    let clock = FixedClock(now());
    let detector = Detector::new(config(), &source).unwrap().clock(&clock);

    let score = detector.detect_for_stream(1);
    assert_eq!(score.status, Status::InsufficientData);
    assert!(score.reason().unwrap().starts_with("baseline window"));
}

#[test]
fn test_low_viewcount_is_inactive() {
    let mut source = MemorySource::default();
    source.add(1, "abcdefghijk", baseline_then_recent(&[5; 10], &[3, 4, 5]));
    let clock = FixedClock(now());
    let detector = Detector::new(config(), &source).unwrap().clock(&clock);

    let score = detector.detect_for_stream(1);
    assert_eq!(score.status, Status::Inactive);
    assert!(score.reason().unwrap().contains("below minimum viewcount"));
}

#[test]
fn test_collapse_from_large_baseline_is_inactive() {
    let mut source = MemorySource::default();
    source.add(1, "abcdefghijk", baseline_then_recent(&[10_000; 10], &[50, 50, 50]));
    let clock = FixedClock(now());
    let detector = Detector::new(config(), &source).unwrap().clock(&clock);

    let score = detector.detect_for_stream(1);
    assert_eq!(score.status, Status::Inactive);
    assert!(score.reason().unwrap().contains("collapsed"));
}

#[test]
fn test_stale_stream_is_inactive() {
    let mut settings = small_settings();
    settings.baseline_hours = 3;
    let config = settings.build().unwrap();
    let mut source = MemorySource::default();
    source.add(1, "abcdefghijk", samples_ending(90, &[1000; 20]));
    let clock = FixedClock(now());
    let detector = Detector::new(config, &source).unwrap().clock(&clock);

    let score = detector.detect_for_stream(1);
    assert_eq!(score.status, Status::Inactive);
    assert_eq!(score.reason(), Some("no samples in the last 60 minutes"));
    assert_eq!(score.last_updated, Some(now() - Duration::minutes(90)));
}

#[test]
fn test_enrichment_applied_after_scoring() {
    let source = mixed_source();
    let clock = FixedClock(now());
    let detector = Detector::new(config(), &source).unwrap().clock(&clock);

    let score = detector.detect_for_stream(2);
    assert_eq!(score.name.as_deref(), Some("Stream 2"));
    assert_eq!(score.channel.as_deref(), Some("Test Channel"));
    assert_eq!(score.current_viewcount, Some(3000));
    assert_eq!(score.last_updated, Some(now()));
    assert_eq!(score.computed_at, now());

    let empty = detector.detect_for_stream(3);
    assert_eq!(empty.name.as_deref(), Some("Stream 3"));
    assert_eq!(empty.current_viewcount, None);
}

#[test]
fn test_out_of_range_custom_score_clamped() {
    let source = mixed_source();
    let clock = FixedClock(now());
    let (strategy, calls) = fixed(250.0);
    let detector = Detector::with_strategy(config(), &source, strategy).clock(&clock);

    let score = detector.detect_for_stream(1);
    assert_eq!(score.status, Status::Normal);
    assert_eq!(score.score, 100.0);
    assert_eq!(score.algorithm, "fixed");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_non_finite_custom_score_is_error() {
    let source = mixed_source();
    let clock = FixedClock(now());
    let (strategy, _) = fixed(f64::NAN);
    let detector = Detector::with_strategy(config(), &source, strategy).clock(&clock);

    let score = detector.detect_for_stream(1);
    assert_eq!(score.status, Status::Error);
    assert!(score.reason().unwrap().contains("non-finite"));
    assert_eq!(score.score, 0.0);
}

#[test]
fn test_unknown_algorithm_fails_before_scoring() {
    let source = mixed_source();
    let err = Detector::with_registry(config(), &source, &StrategyRegistry::empty())
        .err()
        .unwrap();
    assert!(matches!(err, FactoryError::UnknownAlgorithm { .. }));
}

#[test]
fn test_cancelled_run_scores_nothing() {
    let source = mixed_source();
    let clock = FixedClock(now());
    let token = CancelToken::new();
    token.cancel();
    let detector = Detector::new(config(), &source)
        .unwrap()
        .clock(&clock)
        .cancel_token(token.clone());

    assert!(token.is_cancelled());
    assert!(detector.detect_all_live(None).unwrap().is_empty());
}

#[test]
fn test_parallel_matches_serial() {
    let source = mixed_source();
    let clock = FixedClock(now());
    let serial = Detector::new(config(), &source).unwrap().clock(&clock);
    let parallel = Detector::new(config(), &source)
        .unwrap()
        .clock(&clock)
        .workers(4);

    let first = parallel.detect_all_live(None).unwrap();
    assert_eq!(serial.detect_all_live(None).unwrap(), first);
    assert_eq!(parallel.detect_all_live(None).unwrap(), first);
    assert_eq!(parallel.detect_batch(&[2, 1]).unwrap().len(), 2);
}

#[test]
fn test_detect_batch_keeps_input_order() {
    let source = mixed_source();
    let clock = FixedClock(now());
    let detector = Detector::new(config(), &source).unwrap().clock(&clock).workers(2);

    let ids: Vec<i64> = detector
        .detect_batch(&[3, 1, 42, 2])
        .unwrap()
        .iter()
        .map(|s| s.stream_id)
        .collect();
    assert_eq!(ids, vec![3, 1, 42, 2]);
}

#[test]
fn test_trending_filters_by_status_and_score() {
    let source = mixed_source();
    let clock = FixedClock(now());
    let detector = Detector::new(config(), &source).unwrap().clock(&clock);

    let trending = detector.trending(0.0, 10).unwrap();
    assert_eq!(trending.len(), 1);
    assert_eq!(trending[0].stream_id, 2);
    assert!(detector.trending(99.0, 10).unwrap().is_empty());
}

#[test]
fn test_ended_streams_are_not_ranked() {
    let mut source = mixed_source();
    source.streams[1].is_live = false;
    let clock = FixedClock(now());
    let detector = Detector::new(config(), &source).unwrap().clock(&clock);

    let ids: Vec<i64> = detector
        .detect_all_live(None)
        .unwrap()
        .iter()
        .map(|s| s.stream_id)
        .collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn test_detector_over_database() {
    let (_dir, db) = setup_db();
    let stream = common::add_stream(&db, "dbstream001", "From DB");
    db.insert_samples(stream.id, &baseline_then_recent(&[1000; 10], &[3000; 4]))
        .unwrap();
    let clock = FixedClock(now());
    let source: &dyn ViewershipSource = &db;
    let detector = Detector::new(config(), source).unwrap().clock(&clock);

    let ranked = detector.detect_all_live(None).unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].status, Status::Trending);
    assert_eq!(ranked[0].name.as_deref(), Some("From DB"));
    assert_eq!(ranked[0].current_viewcount, Some(3000));
}
