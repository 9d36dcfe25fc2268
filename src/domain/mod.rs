//! Domain layer: rate-limiting policy, probe contracts, session identity.
//!
//! This layer has no dependencies on HTTP or infrastructure concerns.
//!
//! # Modules
//!
//! - [`ratelimit`] - Token buckets, named limiter groups, and the registry
//! - [`probe`] - Dependency probe trait implemented by the backend layer
//! - [`session`] - Session records and identifier generation

pub mod probe;
pub mod ratelimit;
pub mod session;

pub use probe::DependencyProbe;
pub use ratelimit::{Decision, GroupPolicy, KeySource, LimiterGroup, LimiterRegistry};
pub use session::{SHARED_SESSION_ID, SessionRecord};

#[cfg(test)]
pub use probe::MockDependencyProbe;
