use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::{CachedResponse, ResponseCache};

/// SQLite-backed response cache, one row per request URL.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Opens (or creates) the cache database at `path`.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open response cache '{path}'"))?;
        debug!(path, "Response cache opened");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS responses (
                request_url TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                fetched_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS responses_fetched_at ON responses (fetched_at);
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("response cache poisoned"))
    }
}

impl ResponseCache for SqliteCache {
    fn get(&self, key: &str) -> Result<Option<CachedResponse>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT body, fetched_at FROM responses WHERE request_url = ?1",
                params![key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        match row {
            Some((body, secs)) => {
                let fetched_at = DateTime::from_timestamp(secs, 0)
                    .ok_or_else(|| anyhow!("cached fetched_at {secs} out of range"))?;
                Ok(Some(CachedResponse { body, fetched_at }))
            }
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, body: &str, fetched_at: DateTime<Utc>) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO responses (request_url, body, fetched_at) VALUES (?1, ?2, ?3)",
            params![key, body, fetched_at.timestamp()],
        )?;
        Ok(())
    }

    fn evict_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM responses WHERE fetched_at < ?1",
            params![cutoff.timestamp()],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    #[test]
    fn test_roundtrip_truncates_to_seconds() {
        let cache = SqliteCache::open_in_memory().unwrap();
        let fetched_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        cache.put("https://geo.test/?query=Union", "{}", fetched_at).unwrap();

        let hit = cache.get("https://geo.test/?query=Union").unwrap().unwrap();
        assert_eq!(hit.body, "{}");
        assert_eq!(hit.fetched_at, fetched_at);
    }

    #[test]
    fn test_one_entry_per_key() {
        let cache = SqliteCache::open_in_memory().unwrap();
        let now = Utc::now();
        cache.put("k", "first", now - Duration::days(400)).unwrap();
        cache.put("k", "second", now).unwrap();

        let conn = cache.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM responses", [], |r| r.get(0))
            .unwrap();
        drop(conn);

        assert_eq!(count, 1);
        assert_eq!(cache.get("k").unwrap().unwrap().body, "second");
    }

    #[test]
    fn test_evict_older_than() {
        let cache = SqliteCache::open_in_memory().unwrap();
        let now = Utc::now();
        cache.put("old", "a", now - Duration::days(366)).unwrap();
        cache.put("new", "b", now).unwrap();

        assert_eq!(cache.evict_older_than(now - Duration::days(365)).unwrap(), 1);
        assert!(cache.get("old").unwrap().is_none());
        assert!(cache.get("new").unwrap().is_some());
    }

    #[test]
    fn test_survives_reopen() {
        let path = temp_path("transit_usage_test_cache.sqlite");
        let _ = fs::remove_file(&path);

        {
            let cache = SqliteCache::open(&path).unwrap();
            cache.put("k", "persisted", Utc::now()).unwrap();
        }
        let cache = SqliteCache::open(&path).unwrap();
        assert_eq!(cache.get("k").unwrap().unwrap().body, "persisted");

        drop(cache);
        fs::remove_file(&path).unwrap();
    }
}
