//! Converts a raw usage export into canonical records.
//!
//! The pass is all-or-nothing: the first malformed row aborts it with a
//! [`FormatError`] and no records are returned.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::FormatError;
use crate::records::{CanonicalRecord, RawRecord};

/// `MM/DD/YYYY hh:mm:ss AM|PM`
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

/// Header names of the export columns.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub timestamp: String,
    pub location: String,
    pub amount: String,
    pub agency: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            timestamp: "Date".to_string(),
            location: "Location".to_string(),
            amount: "Amount".to_string(),
            agency: "Transit Agency".to_string(),
        }
    }
}

/// Literal rewrites from coded stop labels to readable names.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct AliasTable(BTreeMap<String, String>);

impl Default for AliasTable {
    fn default() -> Self {
        Self::from_pairs(&[
            ("Zone20", "Square One"),
            ("Zone27", "University of Waterloo"),
        ])
    }
}

impl AliasTable {
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    /// Returns the alias for `name`, or `name` itself when it has none.
    pub fn canonicalize<'a>(&'a self, name: &'a str) -> &'a str {
        self.0.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Reads the export into raw records, keeping only the mapped columns.
pub fn read_raw_records(
    bytes: &[u8],
    columns: &ColumnMap,
) -> Result<Vec<RawRecord>, FormatError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h == name);
    let required = |name: &str| {
        position(name).ok_or_else(|| FormatError::MissingColumn {
            column: name.to_string(),
        })
    };

    let timestamp_idx = required(&columns.timestamp)?;
    let location_idx = required(&columns.location)?;
    let amount_idx = required(&columns.amount)?;
    let agency_idx = position(&columns.agency);

    let cell = |record: &StringRecord, idx: usize| record.get(idx).unwrap_or("").to_string();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let agency = agency_idx
            .and_then(|idx| record.get(idx))
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        rows.push(RawRecord {
            timestamp: cell(&record, timestamp_idx),
            location: cell(&record, location_idx),
            amount: cell(&record, amount_idx),
            agency,
        });
    }

    debug!(rows = rows.len(), "Raw records read");
    Ok(rows)
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).ok()
}

/// Parses a charge such as `-$3.25` into `3.25`.
///
/// One minus sign and one `$` are stripped, in either order. The remainder
/// must be a plain decimal number.
pub fn parse_amount(value: &str) -> Option<f64> {
    let mut rest = value.trim();
    let mut minus = false;
    let mut symbol = false;

    for _ in 0..2 {
        if !minus {
            if let Some(r) = rest.strip_prefix('-') {
                rest = r;
                minus = true;
                continue;
            }
        }
        if !symbol {
            if let Some(r) = rest.strip_prefix('$') {
                rest = r;
                symbol = true;
            }
        }
    }

    let plain = rest.chars().all(|c| c.is_ascii_digit() || c == '.')
        && rest.chars().any(|c| c.is_ascii_digit());
    if !plain {
        return None;
    }

    rest.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

/// Distinct stop names in first-seen order.
pub fn distinct_stop_names(records: &[CanonicalRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.stop_name.as_str()))
        .map(|r| r.stop_name.clone())
        .collect()
}

/// Normalizes exports with a fixed column mapping and alias table.
///
/// Results of [`Normalizer::normalize_bytes`] are memoized by the SHA-256 of
/// the input, so the same export is parsed once per normalizer.
pub struct Normalizer {
    columns: ColumnMap,
    aliases: AliasTable,
    memo: Mutex<HashMap<String, Arc<Vec<CanonicalRecord>>>>,
}

impl Normalizer {
    pub fn new(columns: ColumnMap, aliases: AliasTable) -> Self {
        Self {
            columns,
            aliases,
            memo: Mutex::new(HashMap::new()),
        }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Converts raw records, preserving their order.
    pub fn normalize(&self, raw: &[RawRecord]) -> Result<Vec<CanonicalRecord>, FormatError> {
        raw.iter()
            .enumerate()
            .map(|(i, r)| self.normalize_row(i + 1, r))
            .collect()
    }

    fn normalize_row(&self, row: usize, raw: &RawRecord) -> Result<CanonicalRecord, FormatError> {
        let timestamp = parse_timestamp(&raw.timestamp).ok_or_else(|| FormatError::BadTimestamp {
            row,
            value: raw.timestamp.clone(),
        })?;

        let amount = parse_amount(&raw.amount).ok_or_else(|| FormatError::BadAmount {
            row,
            value: raw.amount.clone(),
        })?;

        let location = raw.location.trim();
        if location.is_empty() {
            return Err(FormatError::EmptyStopName { row });
        }

        Ok(CanonicalRecord {
            timestamp,
            stop_name: self.aliases.canonicalize(location).to_string(),
            amount,
            agency: raw.agency.clone(),
        })
    }

    /// Reads and normalizes a CSV export, reusing the previous result for
    /// byte-identical input.
    pub fn normalize_bytes(
        &self,
        bytes: &[u8],
    ) -> Result<Arc<Vec<CanonicalRecord>>, FormatError> {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = format!("{:x}", hasher.finalize());

        if let Some(hit) = self.memo_lock().get(&digest) {
            debug!(%digest, "Normalized records served from memo");
            return Ok(Arc::clone(hit));
        }

        let raw = read_raw_records(bytes, &self.columns)?;
        let records = Arc::new(self.normalize(&raw)?);
        self.memo_lock().insert(digest, Arc::clone(&records));
        Ok(records)
    }

    fn memo_lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Vec<CanonicalRecord>>>> {
        // A poisoned memo only holds complete results, so keep using it.
        self.memo.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(ColumnMap::default(), AliasTable::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE: &str = "\
Date,Transit Agency,Location,Type,Amount,Balance
01/15/2023 08:30:00 AM,GO Transit,Zone20,Fare Payment,-$3.25,$20.00
01/15/2023 05:45:10 PM,GO Transit,Union Station,Fare Payment,-$3.25,$16.75
02/02/2023 11:02:03 AM,,Zone27,Load Amount,$40.00,$56.75
";

    #[test]
    fn test_presto_fare_row() {
        let normalizer = Normalizer::default();
        let raw = vec![RawRecord::new(
            "01/15/2023 08:30:00 AM",
            "Zone20",
            "-$3.25",
            Some("GO Transit"),
        )];

        let out = normalizer.normalize(&raw).unwrap();

        assert_eq!(out.len(), 1);
        let expected_ts = NaiveDate::from_ymd_opt(2023, 1, 15)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(out[0].timestamp, expected_ts);
        assert_eq!(out[0].stop_name, "Square One");
        assert_eq!(out[0].amount, 3.25);
        assert_eq!(out[0].agency.as_deref(), Some("GO Transit"));
    }

    #[test]
    fn test_parse_timestamp_pm() {
        let ts = parse_timestamp("01/15/2023 05:45:10 PM").unwrap();
        assert_eq!(ts.to_string(), "2023-01-15 17:45:10");
    }

    #[test]
    fn test_parse_timestamp_rejects_other_formats() {
        assert!(parse_timestamp("2023-01-15 08:30:00").is_none());
        assert!(parse_timestamp("13/15/2023 08:30:00 AM").is_none());
        assert!(parse_timestamp("01/15/2023 08:30:00").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_parse_amount_variants() {
        assert_eq!(parse_amount("-$3.25"), Some(3.25));
        assert_eq!(parse_amount("$-3.25"), Some(3.25));
        assert_eq!(parse_amount("$40.00"), Some(40.0));
        assert_eq!(parse_amount("-1.5"), Some(1.5));
        assert_eq!(parse_amount("0"), Some(0.0));
        assert_eq!(parse_amount(" 7 "), Some(7.0));
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("-$"), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("--3.25"), None);
        assert_eq!(parse_amount("NaN"), None);
        assert_eq!(parse_amount("inf"), None);
        assert_eq!(parse_amount("1.2.3"), None);
        assert_eq!(parse_amount("€3.00"), None);
    }

    #[test]
    fn test_unknown_names_pass_through() {
        let aliases = AliasTable::default();
        assert_eq!(aliases.canonicalize("Union Station"), "Union Station");
        assert_eq!(aliases.canonicalize("Zone27"), "University of Waterloo");
    }

    #[test]
    fn test_aliasing_is_idempotent() {
        let aliases = AliasTable::default();
        for name in ["Zone20", "Zone27", "Union Station"] {
            let once = aliases.canonicalize(name);
            assert_eq!(aliases.canonicalize(once), once);
        }
    }

    #[test]
    fn test_normalize_preserves_order_and_count() {
        let normalizer = Normalizer::default();
        let raw = read_raw_records(SAMPLE.as_bytes(), &ColumnMap::default()).unwrap();
        let out = normalizer.normalize(&raw).unwrap();

        assert_eq!(out.len(), raw.len());
        let names: Vec<_> = out.iter().map(|r| r.stop_name.as_str()).collect();
        assert_eq!(names, ["Square One", "Union Station", "University of Waterloo"]);
        assert!(out.iter().all(|r| r.amount >= 0.0));
        assert_eq!(out[2].agency, None);
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "Date,Location\n01/15/2023 08:30:00 AM,Zone20\n";
        let err = read_raw_records(csv.as_bytes(), &ColumnMap::default()).unwrap_err();
        assert!(matches!(err, FormatError::MissingColumn { ref column } if column == "Amount"));
    }

    #[test]
    fn test_agency_column_is_optional() {
        let csv = "Date,Location,Amount\n01/15/2023 08:30:00 AM,Zone20,-$3.25\n";
        let raw = read_raw_records(csv.as_bytes(), &ColumnMap::default()).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].agency, None);
    }

    #[test]
    fn test_bad_row_aborts_whole_pass() {
        let normalizer = Normalizer::default();
        let raw = vec![
            RawRecord::new("01/15/2023 08:30:00 AM", "Zone20", "-$3.25", None),
            RawRecord::new("01/15/2023 08:30:00 AM", "Zone20", "free", None),
        ];

        let err = normalizer.normalize(&raw).unwrap_err();
        assert!(matches!(err, FormatError::BadAmount { row: 2, .. }));
    }

    #[test]
    fn test_empty_location_rejected() {
        let normalizer = Normalizer::default();
        let raw = vec![RawRecord::new("01/15/2023 08:30:00 AM", "  ", "$1.00", None)];
        let err = normalizer.normalize(&raw).unwrap_err();
        assert!(matches!(err, FormatError::EmptyStopName { row: 1 }));
    }

    #[test]
    fn test_normalize_bytes_is_memoized() {
        let normalizer = Normalizer::default();
        let first = normalizer.normalize_bytes(SAMPLE.as_bytes()).unwrap();
        let second = normalizer.normalize_bytes(SAMPLE.as_bytes()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_distinct_stop_names_first_seen_order() {
        let normalizer = Normalizer::default();
        let raw = vec![
            RawRecord::new("01/15/2023 08:30:00 AM", "Union Station", "$1", None),
            RawRecord::new("01/15/2023 09:30:00 AM", "Zone20", "$1", None),
            RawRecord::new("01/15/2023 10:30:00 AM", "Union Station", "$1", None),
            RawRecord::new("01/15/2023 11:30:00 AM", "Square One", "$1", None),
        ];
        let out = normalizer.normalize(&raw).unwrap();

        assert_eq!(distinct_stop_names(&out), ["Union Station", "Square One"]);
    }
}
