//! Geocoder credential loading.
//!
//! [`KeyStore`] is the async trait for resolving a reference into its plaintext value.
//! [`EnvKeyStore`] reads process environment variables (after `.env` is loaded).
//! [`SsmKeyStore`] implements [`KeyStore`] using AWS SSM Parameter Store.

mod env;
mod ssm;

pub use env::EnvKeyStore;
pub use ssm::SsmKeyStore;

use anyhow::Result;
use transit_usage::error::ConfigurationError;

/// Resolves a vault reference (an env var name or SSM parameter path) into a plaintext secret.
#[async_trait::async_trait]
pub trait KeyStore: Send + Sync {
    async fn get(&self, reference: &str) -> Result<Option<String>>;
}

/// Fetches the credential named by `reference`. Absent or blank values are a
/// [`ConfigurationError::MissingCredential`] so the run stops before any
/// unauthenticated request goes out.
pub async fn load_api_key<K: KeyStore + ?Sized>(
    store: &K,
    reference: &str,
) -> Result<String, ConfigurationError> {
    let value = store
        .get(reference)
        .await
        .map_err(|e| ConfigurationError::SecretStore(format!("{e:#}")))?;

    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigurationError::MissingCredential {
            var: reference.to_string(),
        }),
    }
}
