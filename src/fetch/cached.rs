use chrono::{Duration, Utc};
use reqwest::{Method, Request, Url};
use tracing::{debug, warn};

use super::client::HttpClient;
use crate::cache::ResponseCache;
use crate::error::LookupError;

/// GETs through a [`ResponseCache`]: a fresh entry for the exact URL is
/// returned without touching the network, anything else is fetched live and
/// stored.
///
/// The cache key is the URL handed to [`CachingClient::get_text`]. Auth
/// wrappers inside `C` add credentials after that point, so they never reach
/// the store.
pub struct CachingClient<C, S> {
    inner: C,
    cache: S,
    ttl: Duration,
}

impl<C: HttpClient, S: ResponseCache> CachingClient<C, S> {
    pub fn new(inner: C, cache: S, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn cache(&self) -> &S {
        &self.cache
    }

    pub async fn get_text(&self, url: Url) -> Result<String, LookupError> {
        let key = url.as_str().to_string();
        let now = Utc::now();

        match self.cache.get(&key) {
            Ok(Some(hit)) if is_fresh(now - hit.fetched_at, self.ttl) => {
                debug!(url = %key, "Cache hit");
                return Ok(hit.body);
            }
            Ok(Some(hit)) => debug!(
                url = %key,
                fetched_at = %hit.fetched_at,
                "Cached response expired or dated in the future"
            ),
            Ok(None) => debug!(url = %key, "Cache miss"),
            Err(e) => warn!(url = %key, error = %e, "Cache read failed, fetching live"),
        }

        let resp = self.inner.execute(Request::new(Method::GET, url)).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LookupError::Status {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await?;
        if let Err(e) = self.cache.put(&key, &body, now) {
            warn!(url = %key, error = %e, "Cache write failed");
        }

        Ok(body)
    }
}

/// An entry is fresh when its age is in `[0, ttl)`. A negative age (clock
/// skew, edited rows) counts as stale.
fn is_fresh(age: Duration, ttl: Duration) -> bool {
    age >= Duration::zero() && age < ttl
}
