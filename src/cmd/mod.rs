pub mod completions;
pub mod config;
pub mod init;
pub mod prune;
pub mod rank;
pub mod sample;
pub mod score;
pub mod stream;

use anyhow::{Result, anyhow};
use std::time::Duration;

use streamrank::core::overrides;
use streamrank::db::Database;
use streamrank::models::anomaly::AnomalyConfig;
use streamrank::models::config::Config;
use streamrank::models::stream::Livestream;

pub(crate) fn open_db(config: &Config) -> Result<Database> {
    Database::open_with_timeout(
        &Config::db_path(),
        Duration::from_millis(config.detector.busy_timeout_ms),
    )
}

/// Look a stream up by numeric id, falling back to its video id.
pub(crate) fn resolve_stream(db: &Database, key: &str) -> Result<Livestream> {
    if let Ok(id) = key.parse::<i64>() {
        if let Some(stream) = db.get_stream(id)? {
            return Ok(stream);
        }
    }
    db.get_stream_by_external_id(key)?
        .ok_or_else(|| anyhow!("stream not found: {}", key))
}

/// File settings plus stored overrides, with an optional algorithm override.
pub(crate) fn detection_config(
    db: &Database,
    config: &Config,
    algorithm: Option<&str>,
) -> Result<AnomalyConfig> {
    let mut settings = overrides::effective_settings(db, &config.anomaly)?;
    if let Some(name) = algorithm {
        settings.algorithm = name.to_string();
    }
    Ok(settings.build()?)
}
