use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::HighlightResult;
use crate::settings::app_data_dir;
use crate::storage::KeyValueStore;

/// SQLite-backed key-value store, the reader's stand-in for `localStorage`.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new() -> Result<Self> {
        let app_data_dir = app_data_dir()?;
        if !app_data_dir.exists() {
            std::fs::create_dir_all(&app_data_dir)?;
        }

        Ok(Self::open(app_data_dir.join("visits.db"))?)
    }

    pub fn open(path: impl AsRef<Path>) -> HighlightResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> HighlightResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> HighlightResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> HighlightResult<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys(&self) -> HighlightResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv")?;
        let keys_iter = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut keys = Vec::new();
        for key in keys_iter {
            keys.push(key?);
        }

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visits.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("µRCH.abc", "1000").unwrap();
            store.set("µRCH.abc", "2000").unwrap();
            store.set("other", "x").unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("µRCH.abc").unwrap().as_deref(), Some("2000"));
        let mut keys = store.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["other".to_string(), "µRCH.abc".to_string()]);
    }

    #[test]
    fn remove_and_missing_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("visits.db")).unwrap();
        store.set("k", "1").unwrap();
        store.remove("k").unwrap();
        store.remove("never-there").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
