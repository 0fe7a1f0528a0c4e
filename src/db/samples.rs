use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use crate::core::detector::ViewershipSource;
use crate::models::series::TimeSeries;
use crate::models::stream::{Livestream, Sample};

use super::{Database, from_sql_time, to_sql_time};

fn row_to_sample(timestamp: &str, viewcount: i64) -> Result<Sample> {
    let viewcount = u64::try_from(viewcount)
        .with_context(|| format!("negative viewcount {} at {}", viewcount, timestamp))?;
    Ok(Sample::new(from_sql_time(timestamp)?, viewcount))
}

fn to_sql_count(viewcount: u64) -> Result<i64> {
    i64::try_from(viewcount).with_context(|| format!("viewcount {} is out of range", viewcount))
}

impl Database {
    /// Record one observation. A second sample at the same instant replaces
    /// the first.
    pub fn insert_sample(&self, stream_id: i64, sample: &Sample) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO samples (stream_id, timestamp, viewcount) VALUES (?1, ?2, ?3)
             ON CONFLICT(stream_id, timestamp) DO UPDATE SET viewcount = excluded.viewcount",
            params![stream_id, to_sql_time(sample.timestamp), to_sql_count(sample.viewcount)?],
        )?;
        Ok(())
    }

    /// Record many observations in one transaction.
    pub fn insert_samples(&self, stream_id: i64, samples: &[Sample]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO samples (stream_id, timestamp, viewcount) VALUES (?1, ?2, ?3)
                 ON CONFLICT(stream_id, timestamp) DO UPDATE SET viewcount = excluded.viewcount",
            )?;
            for s in samples {
                stmt.execute(params![stream_id, to_sql_time(s.timestamp), to_sql_count(s.viewcount)?])?;
            }
        }
        tx.commit()?;
        debug!(stream_id, count = samples.len(), "samples inserted");
        Ok(samples.len())
    }

    /// Samples with `start <= timestamp <= end`, oldest first.
    pub fn query_samples(
        &self,
        stream_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sample>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, viewcount FROM samples
             WHERE stream_id = ?1 AND timestamp >= ?2 AND timestamp <= ?3
             ORDER BY timestamp",
        )?;
        let rows = stmt.query_map(
            params![stream_id, to_sql_time(start), to_sql_time(end)],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )?;

        let mut samples = Vec::new();
        for row in rows {
            let (ts, count) = row?;
            samples.push(row_to_sample(&ts, count)?);
        }
        Ok(samples)
    }

    pub fn latest_sample(&self, stream_id: i64) -> Result<Option<Sample>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT timestamp, viewcount FROM samples WHERE stream_id = ?1
                 ORDER BY timestamp DESC LIMIT 1",
                params![stream_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        row.map(|(ts, count)| row_to_sample(&ts, count)).transpose()
    }

    pub fn sample_count(&self, stream_id: i64) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM samples WHERE stream_id = ?1",
            params![stream_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Delete every sample older than `cutoff`. Returns how many were removed.
    pub fn prune_samples_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM samples WHERE timestamp < ?1",
            params![to_sql_time(cutoff)],
        )?;
        debug!(removed, cutoff = %cutoff, "samples pruned");
        Ok(removed)
    }
}

impl ViewershipSource for Database {
    fn live_streams(&self) -> Result<Vec<Livestream>> {
        self.list_streams(true)
    }

    fn stream(&self, id: i64) -> Result<Option<Livestream>> {
        self.get_stream(id)
    }

    fn fetch_series(
        &self,
        stream: &Livestream,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TimeSeries> {
        let samples = self.query_samples(stream.id, start, end)?;
        Ok(TimeSeries::from_samples(stream.id, stream.external_id.as_str(), &samples)?)
    }
}
