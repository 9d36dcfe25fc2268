//! Shared application state and per-request context.

use std::sync::Arc;

use crate::application::services::HealthService;
use crate::config::Config;
use crate::domain::ratelimit::LimiterRegistry;

/// Shared application state passed to handlers and middleware via axum's
/// `State` extractor. Cloning is cheap (all fields are `Arc`s).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub limiters: Arc<LimiterRegistry>,
    pub health: Arc<HealthService>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        limiters: Arc<LimiterRegistry>,
        health: Arc<HealthService>,
    ) -> Self {
        Self {
            config,
            limiters,
            health,
        }
    }
}

/// Per-request context inserted by the identity middleware and read by
/// downstream stages and handlers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub session_id: String,
}
