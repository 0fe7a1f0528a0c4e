use anyhow::{Result, bail};
use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use crate::models::stream::Livestream;

use super::{Database, from_sql_time, to_sql_time};

const STREAM_COLUMNS: &str =
    "id, public_id, external_id, name, channel, url, is_live, created_at, updated_at";

struct StreamRow {
    id: i64,
    public_id: String,
    external_id: String,
    name: String,
    channel: String,
    url: String,
    is_live: bool,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StreamRow> {
    Ok(StreamRow {
        id: row.get(0)?,
        public_id: row.get(1)?,
        external_id: row.get(2)?,
        name: row.get(3)?,
        channel: row.get(4)?,
        url: row.get(5)?,
        is_live: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn row_to_stream(r: StreamRow) -> Result<Livestream> {
    Ok(Livestream {
        id: r.id,
        public_id: r.public_id,
        external_id: r.external_id,
        name: r.name,
        channel: r.channel,
        url: r.url,
        is_live: r.is_live,
        created_at: from_sql_time(&r.created_at)?,
        updated_at: from_sql_time(&r.updated_at)?,
    })
}

impl Database {
    /// Insert a stream and return it with its assigned id.
    pub fn insert_stream(&self, s: &Livestream) -> Result<Livestream> {
        if self.get_stream_by_external_id(&s.external_id)?.is_some() {
            bail!("stream {} is already tracked", s.external_id);
        }
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO streams (public_id, external_id, name, channel, url, is_live, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                s.public_id,
                s.external_id,
                s.name,
                s.channel,
                s.url,
                s.is_live,
                to_sql_time(s.created_at),
                to_sql_time(s.updated_at),
            ],
        )?;
        Ok(Livestream {
            id: conn.last_insert_rowid(),
            ..s.clone()
        })
    }

    pub fn get_stream(&self, id: i64) -> Result<Option<Livestream>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM streams WHERE id = ?1", STREAM_COLUMNS),
                params![id],
                read_row,
            )
            .optional()?;
        row.map(row_to_stream).transpose()
    }

    pub fn get_stream_by_external_id(&self, external_id: &str) -> Result<Option<Livestream>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM streams WHERE external_id = ?1", STREAM_COLUMNS),
                params![external_id],
                read_row,
            )
            .optional()?;
        row.map(row_to_stream).transpose()
    }

    /// Streams in insertion order, optionally only the live ones.
    pub fn list_streams(&self, live_only: bool) -> Result<Vec<Livestream>> {
        let conn = self.conn()?;
        let sql = if live_only {
            format!("SELECT {} FROM streams WHERE is_live = 1 ORDER BY id", STREAM_COLUMNS)
        } else {
            format!("SELECT {} FROM streams ORDER BY id", STREAM_COLUMNS)
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], read_row)?;

        let mut streams = Vec::new();
        for row in rows {
            streams.push(row_to_stream(row?)?);
        }
        Ok(streams)
    }

    /// Returns false when no stream has that id.
    pub fn set_live(&self, id: i64, is_live: bool) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE streams SET is_live = ?1, updated_at = ?2 WHERE id = ?3",
            params![is_live, to_sql_time(Utc::now()), id],
        )?;
        Ok(changed > 0)
    }
}
