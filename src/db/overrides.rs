use anyhow::Result;
use chrono::Utc;
use rusqlite::params;

use crate::core::overrides::{OverrideStore, StoredOverride, ValueType};

use super::{Database, to_sql_time};

impl OverrideStore for Database {
    fn overrides(&self) -> Result<Vec<StoredOverride>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key, type, value FROM anomaly_config ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredOverride {
                key: row.get(0)?,
                value_type: row.get(1)?,
                value: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn put_override(&self, key: &str, value_type: ValueType, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO anomaly_config (key, type, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET type = excluded.type, value = excluded.value,
                 updated_at = excluded.updated_at",
            params![key, value_type.as_str(), value, to_sql_time(Utc::now())],
        )?;
        Ok(())
    }

    fn delete_override(&self, key: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM anomaly_config WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }
}
