use anyhow::{Context, Result};

use super::KeyStore;

/// Resolves secrets from AWS SSM Parameter Store.
///
/// Parameters are fetched with decryption enabled, so `SecureString` values
/// work as long as the process has `ssm:GetParameter` and the matching KMS
/// permissions.
pub struct SsmKeyStore {
    client: aws_sdk_ssm::Client,
}

impl SsmKeyStore {
    /// Creates a store from configuration loaded by `aws_config::load_from_env`.
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_ssm::Client::new(config),
        }
    }
}

#[async_trait::async_trait]
impl KeyStore for SsmKeyStore {
    /// Fetches the parameter at `reference` (e.g. `/transit/geocoder/api_key`).
    async fn get(&self, reference: &str) -> Result<Option<String>> {
        let resp = self
            .client
            .get_parameter()
            .name(reference)
            .with_decryption(true)
            .send()
            .await
            .with_context(|| format!("SSM GetParameter failed for '{reference}'"))?;

        Ok(resp.parameter.and_then(|p| p.value))
    }
}
