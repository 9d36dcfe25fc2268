//! Dependency probe trait for readiness aggregation.

use async_trait::async_trait;

/// A minimal, side-effect-free check against one backend dependency.
///
/// Implementations live in the infrastructure layer and go through channels
/// built by [`crate::infrastructure::backend::ChannelFactory`]. Probes must be
/// safe to run concurrently and must honor cancellation: the readiness
/// aggregator wraps every probe in its share of the overall deadline and treats
/// an expired probe as failed without retrying it.
///
/// # Implementations
///
/// - [`crate::infrastructure::backend::Backend`] - HTTP probe per backend
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DependencyProbe: Send + Sync {
    /// Stable dependency name reported in readiness bodies and logs.
    fn name(&self) -> &str;

    /// Performs one read-only check against the dependency.
    ///
    /// # Errors
    ///
    /// Returns the underlying transport or status error when the dependency is
    /// unreachable or answers with a failure status.
    async fn check(&self) -> anyhow::Result<()>;
}
