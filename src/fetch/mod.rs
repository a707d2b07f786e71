//! HTTP plumbing for provider lookups.

mod basic;
mod cached;
mod client;
pub mod auth;

#[cfg(test)]
pub(crate) mod fake;

pub use basic::BasicClient;
pub use cached::CachingClient;
pub use client::HttpClient;
