use serde::Deserialize;

use super::provider::Candidate;
use crate::records::Coordinate;

/// Rough latitude/longitude rectangle around the service region.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    pub fn contains(&self, c: Coordinate) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&c.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&c.longitude)
    }
}

/// Which provider results are trusted.
///
/// The defaults are tuned for the GO Transit / PRESTO service area in
/// southern Ontario. Other regions need their own values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverPolicy {
    /// Expected region code; `None` accepts any region.
    pub region_code: Option<String>,
    /// Expected country code; `None` accepts any country.
    pub country_code: Option<String>,
    /// Place types too coarse to pin a stop on.
    pub denied_place_types: Vec<String>,
    /// Selected coordinates outside this box are dropped.
    pub bounds: Option<BoundingBox>,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            region_code: Some("ON".to_string()),
            country_code: Some("CAN".to_string()),
            denied_place_types: [
                "neighbourhood",
                "neighborhood",
                "locality",
                "county",
                "region",
                "macroregion",
                "country",
                "postalcode",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            bounds: Some(BoundingBox {
                min_latitude: 41.5,
                max_latitude: 46.5,
                min_longitude: -83.5,
                max_longitude: -76.0,
            }),
        }
    }
}

fn matches_expected(expected: Option<&str>, actual: Option<&str>) -> bool {
    match (expected, actual) {
        (None, _) => true,
        (Some(e), Some(a)) => e.eq_ignore_ascii_case(a),
        (Some(_), None) => false,
    }
}

impl ResolverPolicy {
    pub fn accepts(&self, candidate: &Candidate) -> bool {
        let denied = candidate.place_type.as_deref().is_some_and(|t| {
            self.denied_place_types
                .iter()
                .any(|d| d.eq_ignore_ascii_case(t))
        });

        !denied
            && matches_expected(self.region_code.as_deref(), candidate.region_code.as_deref())
            && matches_expected(self.country_code.as_deref(), candidate.country_code.as_deref())
    }

    /// First accepted candidate in rank order, unless it falls outside the
    /// bounding box. Lower-ranked candidates are never used as a fallback
    /// for an out-of-bounds pick.
    pub fn select(&self, candidates: &[Candidate]) -> Option<Coordinate> {
        let chosen = candidates.iter().find(|c| self.accepts(c))?;
        let coordinate = Coordinate {
            latitude: chosen.latitude,
            longitude: chosen.longitude,
        };

        match self.bounds {
            Some(bounds) if !bounds.contains(coordinate) => None,
            _ => Some(coordinate),
        }
    }
}
