use std::collections::HashSet;

use tracing::{debug, info};

use super::policy::ResolverPolicy;
use super::provider::{ProviderConfig, parse_candidates};
use crate::cache::ResponseCache;
use crate::error::LookupError;
use crate::fetch::{CachingClient, HttpClient};
use crate::records::{Coordinate, ResolvedStop};

/// Resolves stop names sequentially through a caching client.
pub struct LocationResolver<C, S> {
    client: CachingClient<C, S>,
    provider: ProviderConfig,
    policy: ResolverPolicy,
}

impl<C: HttpClient, S: ResponseCache> LocationResolver<C, S> {
    pub fn new(
        client: CachingClient<C, S>,
        provider: ProviderConfig,
        policy: ResolverPolicy,
    ) -> Self {
        Self {
            client,
            provider,
            policy,
        }
    }

    pub fn client(&self) -> &CachingClient<C, S> {
        &self.client
    }

    /// Looks up one name. `Ok(None)` means the provider answered but no
    /// candidate passed the policy.
    pub async fn lookup(&self, stop_name: &str) -> Result<Option<Coordinate>, LookupError> {
        let url = self.provider.search_url(stop_name)?;
        let body = self.client.get_text(url).await?;
        let candidates = parse_candidates(&body)?;
        Ok(self.policy.select(&candidates))
    }

    /// Resolves `names` in order. Names that fail or find no trusted
    /// candidate are left out; each name appears at most once.
    #[tracing::instrument(skip_all, fields(names = names.len()))]
    pub async fn resolve(&self, names: &[String]) -> Vec<ResolvedStop> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();

        for name in names {
            if !seen.insert(name.as_str()) {
                continue;
            }

            match self.lookup(name).await {
                Ok(Some(coordinate)) => {
                    debug!(
                        stop = %name,
                        latitude = coordinate.latitude,
                        longitude = coordinate.longitude,
                        "Stop resolved"
                    );
                    resolved.push(ResolvedStop {
                        stop_name: name.clone(),
                        coordinate,
                    });
                }
                Ok(None) => debug!(stop = %name, "No candidate passed the policy"),
                Err(e) => debug!(stop = %name, error = %e, "Lookup failed"),
            }
        }

        info!(
            requested = seen.len(),
            resolved = resolved.len(),
            "Stop names resolved"
        );
        resolved
    }
}
