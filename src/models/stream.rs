use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tracked livestream. `external_id` is the platform's 11-character video id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Livestream {
    pub id: i64,
    pub public_id: String,
    pub external_id: String,
    pub name: String,
    pub channel: String,
    pub url: String,
    pub is_live: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Livestream {
    /// New live stream, not yet persisted (`id` is assigned on insert).
    pub fn new(external_id: &str, name: &str, channel: &str) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            public_id: Uuid::new_v4().to_string(),
            external_id: external_id.to_string(),
            name: name.to_string(),
            channel: channel.to_string(),
            url: watch_url(external_id),
            is_live: true,
            created_at: now,
            updated_at: now,
        }
    }
}

pub fn watch_url(external_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", external_id)
}

/// Whether `id` looks like a platform video id (11 chars of `[A-Za-z0-9_-]`).
pub fn is_valid_external_id(id: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9_-]{11}$")
        .map(|re| re.is_match(id))
        .unwrap_or(false)
}

/// One viewcount observation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub viewcount: u64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, viewcount: u64) -> Self {
        Self {
            timestamp,
            viewcount,
        }
    }
}
