//! HTTP server setup and lifecycle.
//!
//! Startup is fail-fast: a bad TLS channel configuration or an unreachable
//! backend aborts the process with a descriptive error instead of serving
//! traffic that cannot be fulfilled.

use anyhow::{Context, Result};
use axum::{Router, ServiceExt, extract::Request};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::Layer;
use tower_http::normalize_path::NormalizePathLayer;

use crate::application::services::HealthService;
use crate::config::Config;
use crate::domain::ratelimit::LimiterRegistry;
use crate::error::set_verbose_errors;
use crate::infrastructure::backend::{BackendPool, ChannelFactory};
use crate::routes::app_router;
use crate::state::AppState;

/// Upper bound on draining in-flight requests after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Builds the full edge pipeline around `business` and serves it until a
/// shutdown signal arrives.
///
/// # Startup sequence
///
/// 1. Build the backend TLS channel factory (aborts on bad TLS config)
/// 2. Dial every backend once (aborts on failure)
/// 3. Construct limiter registry and start the idle-bucket sweeper
/// 4. Bind and serve with graceful shutdown on SIGINT/SIGTERM
pub async fn run(config: Config, business: Router<AppState>) -> Result<()> {
    set_verbose_errors(config.verbose_errors);

    let factory = ChannelFactory::new(
        config.backend_tls_mode,
        config.backend_tls_ca_cert.as_deref(),
        config.connect_timeout,
    )
    .context("failed to construct backend TLS channel factory")?;

    let pool = BackendPool::connect(&factory, &config.backend_addrs, config.connect_timeout)
        .await
        .context("failed to connect to backends")?;
    tracing::info!("all backends reachable");

    let limiters = Arc::new(LimiterRegistry::new(
        config.limiter_groups.clone(),
        config.rate_limit_disabled,
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = spawn_sweeper(
        limiters.clone(),
        config.sweep_interval,
        config.idle_timeout,
        shutdown_rx,
    );

    let health = Arc::new(HealthService::new(pool.probes(), config.readiness_timeout));

    let listen_addr = config.listen_addr.clone();
    let state = AppState::new(Arc::new(config), limiters, health);
    let app = app_router(state, business);
    let app = NormalizePathLayer::trim_trailing_slash().layer(app);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    tracing::info!("Server listening on {}", listen_addr);

    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel();
    let server = axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = drain_tx.send(());
    });

    // Drain in-flight requests, but never for longer than the grace period.
    tokio::select! {
        result = server => result.context("server error")?,
        _ = drain_deadline(drain_rx, SHUTDOWN_GRACE) => {
            tracing::warn!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "shutdown grace period expired with requests still in flight"
            );
        }
    }

    // Stop the sweeper before reporting a clean exit.
    let _ = shutdown_tx.send(true);
    let _ = sweeper.await;
    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Completes `grace` after the shutdown signal has fired. Until the signal
/// arrives this future is pending, so a healthy serve loop is never raced.
async fn drain_deadline(drain_rx: tokio::sync::oneshot::Receiver<()>, grace: Duration) {
    let _ = drain_rx.await;
    tokio::time::sleep(grace).await;
}

/// Periodically evicts idle rate-limit buckets so the key maps stay bounded.
fn spawn_sweeper(
    limiters: Arc<LimiterRegistry>,
    interval: Duration,
    idle_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = limiters.sweep(idle_timeout);
                    if evicted > 0 {
                        tracing::debug!(evicted, "evicted idle rate-limit buckets");
                    }
                }
                _ = shutdown.changed() => {
                    tracing::debug!("rate-limit sweeper stopped");
                    break;
                }
            }
        }
    })
}

/// Resolves when SIGINT (Ctrl+C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
