pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod geocode;
pub mod normalizer;
pub mod output;
pub mod records;
pub mod summary;
