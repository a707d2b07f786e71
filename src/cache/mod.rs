//! Persistent store for raw geocoding responses.
//!
//! [`ResponseCache`] is the collaborator the resolver talks to; expiry policy
//! lives with the caller ([`crate::fetch::CachingClient`]), the store only
//! records when each body was fetched.

mod memory;
mod sqlite;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

use anyhow::Result;
use chrono::{DateTime, Utc};

/// A stored response body and the instant it was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

/// Key-value store keyed by the full request URL.
pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CachedResponse>>;

    /// Stores `body` under `key`, replacing any previous (expired) entry.
    fn put(&self, key: &str, body: &str, fetched_at: DateTime<Utc>) -> Result<()>;

    /// Removes entries fetched before `cutoff`. Returns how many were removed.
    fn evict_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

impl<T: ResponseCache + ?Sized> ResponseCache for Box<T> {
    fn get(&self, key: &str) -> Result<Option<CachedResponse>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, body: &str, fetched_at: DateTime<Utc>) -> Result<()> {
        (**self).put(key, body, fetched_at)
    }

    fn evict_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        (**self).evict_older_than(cutoff)
    }
}
