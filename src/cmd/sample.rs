use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

use streamrank::models::config::Config;
use streamrank::models::stream::Sample;
use streamrank::output;

use super::{open_db, resolve_stream};

#[derive(Deserialize)]
#[serde(untagged)]
enum StreamRef {
    Id(i64),
    Key(String),
}

impl StreamRef {
    fn key(&self) -> String {
        match self {
            Self::Id(id) => id.to_string(),
            Self::Key(k) => k.clone(),
        }
    }
}

#[derive(Deserialize)]
struct BatchEntry {
    stream: StreamRef,
    viewcount: u64,
    timestamp: Option<DateTime<Utc>>,
}

fn parse_time(at: Option<&str>) -> Result<DateTime<Utc>> {
    match at {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("invalid timestamp '{}'", s))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

pub fn run(key: &str, viewcount: u64, at: Option<&str>) -> Result<()> {
    let config = Config::load()?;
    let db = open_db(&config)?;
    let stream = resolve_stream(&db, key)?;
    let sample = Sample::new(parse_time(at)?, viewcount);
    db.insert_sample(stream.id, &sample)?;

    let out = output::success(
        "sample",
        json!({ "stream_id": stream.id, "sample": sample }),
    );
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}

pub fn run_batch(batch_json: &str) -> Result<()> {
    let entries: Vec<BatchEntry> =
        serde_json::from_str(batch_json).context("batch must be a JSON array of samples")?;
    let config = Config::load()?;
    let db = open_db(&config)?;
    let now = Utc::now();

    let mut by_stream: BTreeMap<i64, Vec<Sample>> = BTreeMap::new();
    for entry in &entries {
        let stream = resolve_stream(&db, &entry.stream.key())?;
        by_stream
            .entry(stream.id)
            .or_default()
            .push(Sample::new(entry.timestamp.unwrap_or(now), entry.viewcount));
    }

    let mut inserted = 0;
    for (stream_id, samples) in &by_stream {
        inserted += db.insert_samples(*stream_id, samples)?;
    }

    let out = output::success(
        "sample",
        json!({ "inserted": inserted, "streams": by_stream.len() }),
    );
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}
