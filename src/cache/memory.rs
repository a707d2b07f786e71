use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};

use super::{CachedResponse, ResponseCache};

/// Process-local cache. Nothing survives the run.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CachedResponse>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<CachedResponse>> {
        let entries = self.entries.lock().map_err(|_| anyhow!("memory cache poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, body: &str, fetched_at: DateTime<Utc>) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("memory cache poisoned"))?;
        entries.insert(
            key.to_string(),
            CachedResponse {
                body: body.to_string(),
                fetched_at,
            },
        );
        Ok(())
    }

    fn evict_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("memory cache poisoned"))?;
        let before = entries.len();
        entries.retain(|_, v| v.fetched_at >= cutoff);
        Ok(before - entries.len())
    }
}
