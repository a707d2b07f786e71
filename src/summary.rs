//! Aggregates behind the dashboard charts.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::Serialize;

use crate::records::{CanonicalRecord, ResolvedStop};

pub const DEFAULT_TOP_STOPS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopCount {
    pub stop_name: String,
    pub taps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthAmount {
    /// `YYYY-MM`
    pub month: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthCount {
    /// `YYYY-MM`
    pub month: String,
    pub taps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgencyAmount {
    pub agency: String,
    pub amount: f64,
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Counts keyed in first-seen order, then sorted descending by value.
/// The sort is stable, so ties keep first-seen order.
fn ranked<V, F>(
    records: &[CanonicalRecord],
    key: F,
    value: impl Fn(&CanonicalRecord) -> V,
) -> Vec<(String, V)>
where
    V: std::ops::AddAssign + Default + Copy + PartialOrd,
    F: Fn(&CanonicalRecord) -> Option<&str>,
{
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<(String, V)> = Vec::new();

    for r in records {
        let Some(k) = key(r) else { continue };
        let slot = *index.entry(k).or_insert_with(|| {
            totals.push((k.to_string(), V::default()));
            totals.len() - 1
        });
        totals[slot].1 += value(r);
    }

    totals.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    totals
}

/// Per-month totals from the first to the last month present, with empty
/// months in between reported as zero.
fn monthly<V>(
    records: &[CanonicalRecord],
    value: impl Fn(&CanonicalRecord) -> V,
) -> Vec<(String, V)>
where
    V: std::ops::AddAssign + Default + Copy,
{
    let mut buckets: BTreeMap<NaiveDate, V> = BTreeMap::new();
    for r in records {
        let ts = r.timestamp.date();
        let Some(month) = NaiveDate::from_ymd_opt(ts.year(), ts.month(), 1) else {
            continue;
        };
        *buckets.entry(month).or_default() += value(r);
    }

    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut month = first;
    while month <= last {
        let total = buckets.get(&month).copied().unwrap_or_default();
        out.push((month.format("%Y-%m").to_string(), total));
        match month.checked_add_months(Months::new(1)) {
            Some(next) => month = next,
            None => break,
        }
    }
    out
}

/// The `n` most tapped stops.
pub fn top_stops(records: &[CanonicalRecord], n: usize) -> Vec<StopCount> {
    ranked(records, |r| Some(r.stop_name.as_str()), |_| 1usize)
        .into_iter()
        .take(n)
        .map(|(stop_name, taps)| StopCount { stop_name, taps })
        .collect()
}

pub fn monthly_spending(records: &[CanonicalRecord]) -> Vec<MonthAmount> {
    monthly(records, |r| r.amount)
        .into_iter()
        .map(|(month, amount)| MonthAmount {
            month,
            amount: round_cents(amount),
        })
        .collect()
}

pub fn monthly_taps(records: &[CanonicalRecord]) -> Vec<MonthCount> {
    monthly(records, |_| 1usize)
        .into_iter()
        .map(|(month, taps)| MonthCount { month, taps })
        .collect()
}

/// Spending per agency, largest first. Records without an agency are skipped.
pub fn agency_spending(records: &[CanonicalRecord]) -> Vec<AgencyAmount> {
    ranked(records, |r| r.agency.as_deref(), |r| r.amount)
        .into_iter()
        .map(|(agency, amount)| AgencyAmount {
            agency,
            amount: round_cents(amount),
        })
        .collect()
}

/// Everything the rendering layer consumes.
#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub generated_at: DateTime<Utc>,
    pub record_count: usize,
    pub top_stops: Vec<StopCount>,
    pub monthly_spending: Vec<MonthAmount>,
    pub monthly_taps: Vec<MonthCount>,
    pub agency_spending: Vec<AgencyAmount>,
    pub stop_locations: Vec<ResolvedStop>,
}

impl DashboardSummary {
    pub fn build(records: &[CanonicalRecord], top_n: usize) -> Self {
        Self {
            generated_at: Utc::now(),
            record_count: records.len(),
            top_stops: top_stops(records, top_n),
            monthly_spending: monthly_spending(records),
            monthly_taps: monthly_taps(records),
            agency_spending: agency_spending(records),
            stop_locations: Vec::new(),
        }
    }

    pub fn with_locations(mut self, stops: Vec<ResolvedStop>) -> Self {
        self.stop_locations = stops;
        self
    }
}
