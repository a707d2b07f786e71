//! Error taxonomy for the usage pipeline.
//!
//! [`FormatError`] aborts a normalization pass, [`LookupError`] is recovered
//! per stop name by the resolver, and [`ConfigurationError`] stops the program
//! before any input is read.

use thiserror::Error;

/// The input table cannot be normalized. Carries the 1-based data row where
/// that applies (the header row is not counted).
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("required column '{column}' not found in CSV header")]
    MissingColumn { column: String },

    #[error("row {row}: timestamp '{value}' does not match MM/DD/YYYY hh:mm:ss AM|PM")]
    BadTimestamp { row: usize, value: String },

    #[error("row {row}: amount '{value}' is not a non-negative number")]
    BadAmount { row: usize, value: String },

    #[error("row {row}: location is empty")]
    EmptyStopName { row: usize },

    #[error("unreadable CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// A single geocode lookup failed. Never fatal.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status}")]
    Status { status: u16 },

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("cannot build lookup URL: {0}")]
    InvalidUrl(String),
}

/// Startup configuration is unusable.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("geocoder credential missing: set {var} or pass --key-ref")]
    MissingCredential { var: String },

    #[error("invalid config file '{path}': {reason}")]
    InvalidConfig { path: String, reason: String },

    #[error("secret store lookup failed: {0}")]
    SecretStore(String),
}
