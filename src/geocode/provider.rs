use std::collections::BTreeMap;

use reqwest::Url;
use serde::Deserialize;

use crate::error::LookupError;

/// How the provider credential travels with a request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderAuth {
    None,
    /// Appended as a query parameter with the given name.
    UrlParam { param_name: String },
    /// Sent as a header with the given name.
    Header { header_name: String },
    /// `Authorization: Bearer <key>`
    Bearer,
}

impl ProviderAuth {
    pub fn requires_credential(&self) -> bool {
        !matches!(self, ProviderAuth::None)
    }
}

/// Free-text search endpoint. Defaults target positionstack's forward
/// geocoding API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub query_param: String,
    /// Fixed parameters added to every search. Sorted, so a given stop name
    /// always produces the same URL (and cache key).
    pub extra_params: BTreeMap<String, String>,
    pub auth: ProviderAuth,
    /// Environment variable holding the credential.
    pub api_key_env: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://api.positionstack.com/v1/forward".to_string(),
            query_param: "query".to_string(),
            extra_params: BTreeMap::from([
                ("country".to_string(), "CA".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]),
            auth: ProviderAuth::UrlParam {
                param_name: "access_key".to_string(),
            },
            api_key_env: "GEOCODER_API_KEY".to_string(),
        }
    }
}

impl ProviderConfig {
    /// Search URL for `stop_name`, without credentials.
    pub fn search_url(&self, stop_name: &str) -> Result<Url, LookupError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| LookupError::InvalidUrl(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair(&self.query_param, stop_name);
            for (k, v) in &self.extra_params {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Candidate {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub region_code: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default, rename = "type")]
    pub place_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    data: Vec<Candidate>,
}

/// Parses a search response body into its ranked candidates.
pub fn parse_candidates(body: &str) -> Result<Vec<Candidate>, LookupError> {
    let resp: SearchResponse =
        serde_json::from_str(body).map_err(|e| LookupError::Malformed(e.to_string()))?;
    Ok(resp.data)
}
