use anyhow::Result;

use super::KeyStore;

/// Reads secrets from environment variables; the reference is the variable name.
pub struct EnvKeyStore;

#[async_trait::async_trait]
impl KeyStore for EnvKeyStore {
    async fn get(&self, reference: &str) -> Result<Option<String>> {
        Ok(std::env::var(reference).ok())
    }
}
