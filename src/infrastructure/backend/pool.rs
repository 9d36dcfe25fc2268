//! Backend connection pool and per-backend probe implementations.
//!
//! One [`Backend`] per upstream dependency, all sharing the pooled client from
//! the [`ChannelFactory`]. Backends are dialed once at startup; a failed dial
//! is fatal because the storefront cannot usefully run without them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::probe::DependencyProbe;
use crate::infrastructure::backend::tls::ChannelFactory;

/// One upstream dependency reachable over a factory-built channel.
pub struct Backend {
    name: &'static str,
    base_url: String,
    probe_url: String,
    client: reqwest::Client,
}

impl Backend {
    fn new(
        name: &'static str,
        addr: &str,
        probe_path: &str,
        factory: &ChannelFactory,
    ) -> Self {
        let base_url = format!("{}://{}", factory.scheme(), addr);
        let probe_url = format!("{base_url}{probe_path}");
        Self {
            name,
            base_url,
            probe_url,
            client: factory.client(),
        }
    }

    /// Base URL for business calls against this backend.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Startup dial: the probe call with an explicit per-request timeout.
    async fn dial(&self, timeout: Duration) -> Result<()> {
        self.client
            .get(&self.probe_url)
            .timeout(timeout)
            .send()
            .await
            .with_context(|| format!("failed to dial {} at {}", self.name, self.probe_url))?
            .error_for_status()
            .with_context(|| format!("{} answered dial probe with an error status", self.name))?;
        Ok(())
    }
}

#[async_trait]
impl DependencyProbe for Backend {
    fn name(&self) -> &str {
        self.name
    }

    async fn check(&self) -> Result<()> {
        let response = self
            .client
            .get(&self.probe_url)
            .send()
            .await
            .with_context(|| format!("{} unavailable", self.name))?;
        response
            .error_for_status()
            .with_context(|| format!("{} probe returned an error status", self.name))?;
        Ok(())
    }
}

/// Upstream service addresses, resolved from configuration.
#[derive(Debug, Clone)]
pub struct BackendAddrs {
    pub product_catalog: String,
    pub currency: String,
    pub cart: String,
}

/// All storefront backends, dialed at startup and pooled for the process
/// lifetime. Constructor-injected so tests never touch shared state.
pub struct BackendPool {
    pub product_catalog: Arc<Backend>,
    pub currency: Arc<Backend>,
    pub cart: Arc<Backend>,
}

impl BackendPool {
    /// Builds every backend over the factory's channel and dials each one.
    ///
    /// # Errors
    ///
    /// Returns an error as soon as any backend cannot be reached within
    /// `dial_timeout`; the caller treats this as fatal.
    pub async fn connect(
        factory: &ChannelFactory,
        addrs: &BackendAddrs,
        dial_timeout: Duration,
    ) -> Result<Self> {
        let product_catalog = Arc::new(Backend::new(
            "product_catalog",
            &addrs.product_catalog,
            "/products",
            factory,
        ));
        let currency = Arc::new(Backend::new(
            "currency",
            &addrs.currency,
            "/currencies",
            factory,
        ));
        // Reading the cart of a reserved user is side-effect-free even when
        // the cart store is empty.
        let cart = Arc::new(Backend::new(
            "cart",
            &addrs.cart,
            "/cart/health-check",
            factory,
        ));

        let pool = Self {
            product_catalog,
            currency,
            cart,
        };

        for backend in [&pool.product_catalog, &pool.currency, &pool.cart] {
            backend.dial(dial_timeout).await?;
            tracing::info!(backend = backend.name, url = %backend.base_url, "connected to backend");
        }

        Ok(pool)
    }

    /// Readiness probes for every pooled backend.
    pub fn probes(&self) -> Vec<Arc<dyn DependencyProbe>> {
        vec![
            self.product_catalog.clone(),
            self.currency.clone(),
            self.cart.clone(),
        ]
    }
}
