use anyhow::Result;
use rusqlite::Connection;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS streams (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            public_id   TEXT NOT NULL UNIQUE,
            external_id TEXT NOT NULL UNIQUE,
            name        TEXT NOT NULL,
            channel     TEXT NOT NULL,
            url         TEXT NOT NULL,
            is_live     INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_streams_live ON streams(is_live);

        CREATE TABLE IF NOT EXISTS samples (
            stream_id  INTEGER NOT NULL REFERENCES streams(id) ON DELETE CASCADE,
            timestamp  TEXT NOT NULL,
            viewcount  INTEGER NOT NULL CHECK (viewcount >= 0),
            UNIQUE (stream_id, timestamp)
        );
        CREATE INDEX IF NOT EXISTS idx_samples_ts ON samples(timestamp);

        CREATE TABLE IF NOT EXISTS anomaly_config (
            key        TEXT PRIMARY KEY,
            type       TEXT NOT NULL,
            value      TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )?;
    Ok(())
}
