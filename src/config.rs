//! JSON configuration file.
//!
//! Every section is optional; an absent file or section means the built-in
//! PRESTO/GO Transit defaults.
//!
//! ```json
//! {
//!   "aliases": { "Zone20": "Square One", "Zone27": "University of Waterloo" },
//!   "policy": { "region_code": "ON", "country_code": "CAN" },
//!   "cache": { "path": "geocode_cache.sqlite", "ttl_days": 365 }
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::ConfigurationError;
use crate::geocode::{ProviderConfig, ResolverPolicy};
use crate::normalizer::{AliasTable, ColumnMap};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub path: String,
    pub ttl_days: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: "geocode_cache.sqlite".to_string(),
            ttl_days: 365,
        }
    }
}

impl CacheConfig {
    /// Response lifetime. `None` unless `ttl_days` is positive and
    /// representable.
    pub fn ttl(&self) -> Option<Duration> {
        if self.ttl_days <= 0 {
            return None;
        }
        Duration::try_days(self.ttl_days)
    }

    /// Entries fetched before this instant are expired.
    pub fn expiry_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        now.checked_sub_signed(self.ttl()?)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub columns: ColumnMap,
    pub aliases: AliasTable,
    pub provider: ProviderConfig,
    pub policy: ResolverPolicy,
    pub cache: CacheConfig,
}

impl DashboardConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidConfig {
            path: path.to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        Self::parse(path, &content)
    }

    /// Parses and validates config JSON. `path` only labels errors.
    pub fn parse(path: &str, content: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidConfig {
            path: path.to_string(),
            reason,
        };
        let config: Self = serde_json::from_str(content).map_err(|e| invalid(e.to_string()))?;

        if config.cache.expiry_cutoff(Utc::now()).is_none() {
            return Err(invalid(format!(
                "cache.ttl_days must be a positive number of days within range, got {}",
                config.cache.ttl_days
            )));
        }

        Ok(config)
    }

    /// Loads `path` when given, otherwise the defaults.
    pub fn load_or_default(path: Option<&str>) -> Result<Self, ConfigurationError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::ProviderAuth;

    #[test]
    fn test_empty_object_is_all_defaults() {
        let config = DashboardConfig::parse("test.json", "{}").unwrap();
        assert_eq!(config.columns.timestamp, "Date");
        assert_eq!(config.aliases.canonicalize("Zone20"), "Square One");
        assert_eq!(config.cache.ttl(), Some(Duration::days(365)));
        assert_eq!(config.policy.region_code.as_deref(), Some("ON"));
    }

    #[test]
    fn test_partial_sections() {
        let config = DashboardConfig::parse(
            "test.json",
            r#"{
                "columns": { "location": "Stop" },
                "aliases": { "Zone99": "Somewhere" },
                "provider": { "auth": { "type": "header", "header_name": "X-Api-Key" } },
                "policy": { "region_code": null, "bounds": null },
                "cache": { "ttl_days": 30 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.columns.location, "Stop");
        assert_eq!(config.columns.amount, "Amount");
        assert_eq!(config.aliases.canonicalize("Zone20"), "Zone20");
        assert_eq!(config.aliases.canonicalize("Zone99"), "Somewhere");
        assert_eq!(
            config.provider.auth,
            ProviderAuth::Header {
                header_name: "X-Api-Key".to_string()
            }
        );
        assert_eq!(config.provider.query_param, "query");
        assert_eq!(config.policy.region_code, None);
        assert_eq!(config.policy.country_code.as_deref(), Some("CAN"));
        assert!(config.policy.bounds.is_none());
        assert_eq!(config.cache.path, "geocode_cache.sqlite");
        assert_eq!(config.cache.ttl(), Some(Duration::days(30)));
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = DashboardConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidConfig { .. }));
    }

    #[test]
    fn test_ttl_days_must_be_positive() {
        for days in [0, -5] {
            let json = format!(r#"{{"cache":{{"ttl_days":{days}}}}}"#);
            let err = DashboardConfig::parse("test.json", &json).unwrap_err();
            assert!(matches!(err, ConfigurationError::InvalidConfig { .. }));
        }
    }

    #[test]
    fn test_ttl_days_out_of_range() {
        for days in [i64::MAX, 1_000_000_000] {
            let json = format!(r#"{{"cache":{{"ttl_days":{days}}}}}"#);
            let err = DashboardConfig::parse("test.json", &json).unwrap_err();
            assert!(matches!(err, ConfigurationError::InvalidConfig { .. }));
        }
    }

    #[test]
    fn test_expiry_cutoff_is_in_the_past() {
        let now = Utc::now();
        let cutoff = CacheConfig::default().expiry_cutoff(now).unwrap();
        assert_eq!(now - cutoff, Duration::days(365));
    }
}
