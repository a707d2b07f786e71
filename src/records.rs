//! Record types shared by the normalizer, the resolver and the summaries.

use chrono::NaiveDateTime;
use serde::Serialize;

/// One tap event exactly as it appears in the export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub timestamp: String,
    pub location: String,
    pub amount: String,
    pub agency: Option<String>,
}

impl RawRecord {
    pub fn new(timestamp: &str, location: &str, amount: &str, agency: Option<&str>) -> Self {
        Self {
            timestamp: timestamp.to_string(),
            location: location.to_string(),
            amount: amount.to_string(),
            agency: agency.map(str::to_string),
        }
    }
}

/// A typed tap event. `amount` is never negative and `stop_name` never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub timestamp: NaiveDateTime,
    pub stop_name: String,
    pub amount: f64,
    pub agency: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// A stop name the resolver was able to place on the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedStop {
    pub stop_name: String,
    pub coordinate: Coordinate,
}
