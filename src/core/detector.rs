//! Runs a scoring strategy across every live stream and ranks the results.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::core::factory::{FactoryError, StrategyRegistry};
use crate::core::normalize::Logistic;
use crate::core::stats;
use crate::core::strategy::ScoringStrategy;
use crate::models::anomaly::AnomalyConfig;
use crate::models::score::{AnomalyScore, Status};
use crate::models::series::TimeSeries;
use crate::models::stream::Livestream;

/// A baseline median above this counts as "substantial" for collapse checks.
const COLLAPSE_BASELINE_MEDIAN: f64 = 100.0;
/// Recent peak below this fraction of a substantial baseline median is a collapse.
const COLLAPSE_FRACTION: f64 = 0.01;

/// Where stream metadata and viewcount history come from.
///
/// Implementations own their timeouts: a fetch that takes too long should
/// return an error, which the detector turns into an `Error` result for that
/// stream only.
pub trait ViewershipSource: Sync {
    /// Streams currently marked live, in the order they should be ranked on ties.
    fn live_streams(&self) -> Result<Vec<Livestream>>;

    fn stream(&self, id: i64) -> Result<Option<Livestream>>;

    /// Samples with `start <= timestamp <= end`, oldest first.
    fn fetch_series(
        &self,
        stream: &Livestream,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TimeSeries>;
}

pub trait Clock: Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

static SYSTEM_CLOCK: SystemClock = SystemClock;

/// Stops a ranking run from starting more streams. Streams already being
/// fetched or scored finish normally; skipped streams are left out.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Detector<'a> {
    config: AnomalyConfig,
    strategy: Box<dyn ScoringStrategy>,
    curve: Logistic,
    source: &'a dyn ViewershipSource,
    clock: &'a dyn Clock,
    pool: Option<rayon::ThreadPool>,
    cancel: CancelToken,
}

impl<'a> Detector<'a> {
    /// Detector using the built-in strategies.
    pub fn new(config: AnomalyConfig, source: &'a dyn ViewershipSource) -> Result<Self, FactoryError> {
        Self::with_registry(config, source, &StrategyRegistry::default())
    }

    /// Resolve `config.algorithm()` against `registry`. Unknown algorithms
    /// fail here, before any stream is scored.
    pub fn with_registry(
        config: AnomalyConfig,
        source: &'a dyn ViewershipSource,
        registry: &StrategyRegistry,
    ) -> Result<Self, FactoryError> {
        let strategy = registry.create(&config)?;
        Ok(Self::with_strategy(config, source, strategy))
    }

    pub fn with_strategy(
        config: AnomalyConfig,
        source: &'a dyn ViewershipSource,
        strategy: Box<dyn ScoringStrategy>,
    ) -> Self {
        Self {
            curve: Logistic::from_config(&config),
            config,
            strategy,
            source,
            clock: &SYSTEM_CLOCK,
            pool: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Number of streams fetched and scored at once. The pool is built here
    /// and reused by every run; if it cannot be started, streams are scored
    /// one at a time.
    pub fn workers(mut self, workers: usize) -> Self {
        self.pool = None;
        if workers > 1 {
            match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => self.pool = Some(pool),
                Err(e) => warn!(workers, error = %e, "failed to start detection workers, scoring serially"),
            }
        }
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    pub fn algorithm(&self) -> &str {
        self.strategy.name()
    }

    /// Score every live stream; highest score first.
    ///
    /// Ties keep the order `live_streams` returned. Only failing to list the
    /// streams fails the call; per-stream problems become `Error` results.
    pub fn detect_all_live(&self, limit: Option<usize>) -> Result<Vec<AnomalyScore>> {
        let streams = self
            .source
            .live_streams()
            .context("failed to list live streams")?;
        let now = self.clock.now();

        let mut scores = self.each(&streams, |s| self.evaluate(s, now));
        let scored = scores.len();
        rank(&mut scores, limit);

        info!(
            streams = streams.len(),
            scored,
            returned = scores.len(),
            algorithm = self.algorithm(),
            "ranking complete"
        );
        Ok(scores)
    }

    /// Score one stream by id, outside the batch path.
    pub fn detect_for_stream(&self, stream_id: i64) -> AnomalyScore {
        self.evaluate_id(stream_id, self.clock.now())
    }

    /// Score the given streams, in input order.
    pub fn detect_batch(&self, stream_ids: &[i64]) -> Result<Vec<AnomalyScore>> {
        let now = self.clock.now();
        Ok(self.each(stream_ids, |&id| self.evaluate_id(id, now)))
    }

    /// Trending streams scoring at least `min_score`, best first.
    pub fn trending(&self, min_score: f64, limit: usize) -> Result<Vec<AnomalyScore>> {
        Ok(self
            .detect_all_live(None)?
            .into_iter()
            .filter(|s| s.is_trending() && s.score >= min_score)
            .take(limit)
            .collect())
    }

    /// Data sufficiency and activity checks on already split windows.
    /// `None` means the windows are fit to score.
    pub fn validate(&self, recent: &TimeSeries, baseline: &TimeSeries) -> Option<(Status, String)> {
        if recent.sample_count() < self.config.min_recent_samples() {
            return Some((
                Status::InsufficientData,
                format!(
                    "recent window has {} samples, need {}",
                    recent.sample_count(),
                    self.config.min_recent_samples()
                ),
            ));
        }
        if baseline.sample_count() < self.config.min_baseline_samples() {
            return Some((
                Status::InsufficientData,
                format!(
                    "baseline window has {} samples, need {}",
                    baseline.sample_count(),
                    self.config.min_baseline_samples()
                ),
            ));
        }

        let recent_max = recent.viewcounts().iter().copied().max().unwrap_or(0);
        if recent_max == 0 {
            return Some((Status::Inactive, "no viewers in recent window".into()));
        }
        if recent_max < self.config.min_viewcount() {
            return Some((
                Status::Inactive,
                format!(
                    "recent peak {} is below minimum viewcount {}",
                    recent_max,
                    self.config.min_viewcount()
                ),
            ));
        }

        let baseline_median = stats::median(&baseline.values());
        if baseline_median > COLLAPSE_BASELINE_MEDIAN
            && (recent_max as f64) < baseline_median * COLLAPSE_FRACTION
        {
            return Some((
                Status::Inactive,
                format!(
                    "recent peak {} collapsed from baseline median {:.0}",
                    recent_max, baseline_median
                ),
            ));
        }
        None
    }

    fn each<T, F>(&self, items: &[T], f: F) -> Vec<AnomalyScore>
    where
        T: Sync,
        F: Fn(&T) -> AnomalyScore + Sync,
    {
        let scheduled = |item: &T| {
            if self.cancel.is_cancelled() {
                None
            } else {
                Some(f(item))
            }
        };

        let scores: Vec<AnomalyScore> = match &self.pool {
            Some(pool) if items.len() > 1 => {
                pool.install(|| items.par_iter().filter_map(scheduled).collect())
            }
            _ => items.iter().filter_map(scheduled).collect(),
        };

        if self.cancel.is_cancelled() {
            warn!(
                skipped = items.len() - scores.len(),
                "detection cancelled, skipped remaining streams"
            );
        }
        scores
    }

    fn evaluate_id(&self, stream_id: i64, now: DateTime<Utc>) -> AnomalyScore {
        let lookup = catch_unwind(AssertUnwindSafe(|| self.source.stream(stream_id)))
            .unwrap_or_else(|_| Err(anyhow!("stream lookup panicked")));
        match lookup {
            Ok(Some(stream)) => self.evaluate(&stream, now),
            Ok(None) => self.terminal_for(stream_id, "unknown", Status::Error, "stream not found", now),
            Err(e) => {
                warn!(stream_id, error = %e, "stream lookup failed");
                self.terminal_for(stream_id, "unknown", Status::Error, &format!("{:#}", e), now)
            }
        }
    }

    fn evaluate(&self, stream: &Livestream, now: DateTime<Utc>) -> AnomalyScore {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.score_stream(stream, now)))
            .unwrap_or_else(|_| Err(anyhow!("detection panicked for stream {}", stream.id)));
        let (mut score, series) = match outcome {
            Ok((score, series)) => (score, Some(series)),
            Err(e) => {
                warn!(stream_id = stream.id, error = %e, "stream detection failed");
                let score = self.terminal_for(
                    stream.id,
                    &stream.external_id,
                    Status::Error,
                    &format!("{:#}", e),
                    now,
                );
                (score, None)
            }
        };
        enrich(&mut score, stream, series.as_ref());
        debug!(
            stream_id = stream.id,
            status = %score.status,
            score = score.score,
            "stream scored"
        );
        score
    }

    fn score_stream(&self, stream: &Livestream, now: DateTime<Utc>) -> Result<(AnomalyScore, TimeSeries)> {
        let baseline_start = window_start(now, self.config.baseline_window(), "baseline window")?;
        let recent_start = window_start(now, self.config.recent_window(), "recent window")?;
        let stale_before = window_start(now, self.config.inactive_threshold(), "inactive threshold")?;

        let all = self
            .source
            .fetch_series(stream, baseline_start, now)
            .with_context(|| format!("failed to fetch viewership for stream {}", stream.id))?;

        let terminal = |status, reason: &str| {
            self.terminal_for(stream.id, &stream.external_id, status, reason, now)
        };

        let Some(latest) = all.latest_timestamp() else {
            return Ok((terminal(Status::Inactive, "no viewership data found"), all));
        };
        if latest < stale_before {
            let reason = format!(
                "no samples in the last {} minutes",
                self.config.inactive_threshold_minutes()
            );
            return Ok((terminal(Status::Inactive, &reason), all));
        }

        let recent = all.slice_recent(recent_start);
        let baseline = all.slice_baseline(baseline_start, recent_start);

        if let Some((status, reason)) = self.validate(&recent, &baseline) {
            let mut score = terminal(status, &reason);
            score
                .diagnostics
                .insert("recent_samples".into(), Value::from(recent.sample_count()));
            score
                .diagnostics
                .insert("baseline_samples".into(), Value::from(baseline.sample_count()));
            return Ok((score, all));
        }

        let assessment = catch_unwind(AssertUnwindSafe(|| self.strategy.assess(&recent, &baseline)))
            .map_err(|_| anyhow!("strategy '{}' panicked", self.strategy.name()))??;
        if !assessment.score.is_finite() {
            anyhow::bail!(
                "strategy '{}' produced a non-finite score",
                self.strategy.name()
            );
        }
        let status = match assessment.status {
            Status::Normal | Status::Trending => assessment.status,
            other => anyhow::bail!(
                "strategy '{}' returned status {}, expected normal or trending",
                self.strategy.name(),
                other
            ),
        };

        let score = AnomalyScore {
            stream_id: stream.id,
            external_id: stream.external_id.clone(),
            score: self.curve.clamp(assessment.score),
            status,
            raw_score: Some(assessment.raw_score),
            baseline_mean: Some(assessment.baseline_mean),
            baseline_spread: Some(assessment.baseline_spread),
            recent_mean: Some(assessment.recent_mean),
            algorithm: self.strategy.name().to_string(),
            computed_at: now,
            diagnostics: assessment.diagnostics,
            name: None,
            channel: None,
            current_viewcount: None,
            last_updated: None,
        };
        Ok((score, all))
    }

    fn terminal_for(
        &self,
        stream_id: i64,
        external_id: &str,
        status: Status,
        reason: &str,
        now: DateTime<Utc>,
    ) -> AnomalyScore {
        AnomalyScore::terminal(
            stream_id,
            external_id,
            status,
            self.config.score_min(),
            self.strategy.name(),
            reason,
            now,
        )
    }
}

fn window_start(now: DateTime<Utc>, window: Duration, what: &str) -> Result<DateTime<Utc>> {
    now.checked_sub_signed(window)
        .ok_or_else(|| anyhow!("{} reaches before the earliest representable time", what))
}

/// Display metadata is attached only after scoring.
fn enrich(score: &mut AnomalyScore, stream: &Livestream, series: Option<&TimeSeries>) {
    score.name = Some(stream.name.clone());
    score.channel = Some(stream.channel.clone());
    if let Some(series) = series {
        score.current_viewcount = series.latest_viewcount();
        score.last_updated = series.latest_timestamp();
    }
}

/// Stable sort by score, descending, then truncate.
pub fn rank(scores: &mut Vec<AnomalyScore>, limit: Option<usize>) {
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    if let Some(n) = limit {
        scores.truncate(n);
    }
}
