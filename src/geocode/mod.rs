//! Stop name to coordinate resolution.
//!
//! [`ProviderConfig`] describes the text-search endpoint, [`ResolverPolicy`]
//! decides which ranked candidate (if any) is trusted, and
//! [`LocationResolver`] walks the distinct stop names one lookup at a time.

mod policy;
mod provider;
mod resolver;

pub use policy::{BoundingBox, ResolverPolicy};
pub use provider::{Candidate, ProviderAuth, ProviderConfig, parse_candidates};
pub use resolver::LocationResolver;
