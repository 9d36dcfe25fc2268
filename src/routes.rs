//! Route and middleware pipeline configuration.
//!
//! Request-processing order (outermost first):
//!
//! 1. Access log
//! 2. Request identifier
//! 3. Session establishment
//! 4. Rate limiting
//! 5. CSRF validation
//! 6. Security headers / CORS
//! 7. Handler
//!
//! A request rejected by an outer stage never reaches the stages inside it,
//! so a rate-limited request costs no CSRF parsing and no handler work.
//! Individual stages can be switched off via configuration; the rate limiter
//! has its own internal disable switch and always stays wired.

use axum::{Router, middleware::from_fn, middleware::from_fn_with_state, routing::get};

use crate::api::handlers::health;
use crate::api::middleware;
use crate::state::AppState;

/// Assembles the edge pipeline around the business router.
///
/// Operational endpoints (`/robots.txt`, `/_healthz`, `/_readyz`) are merged
/// in before the pipeline is applied, so they share the same admission and
/// security treatment as storefront traffic.
pub fn app_router(state: AppState, business: Router<AppState>) -> Router {
    let mut router = business
        .route("/robots.txt", get(health::robots_handler))
        .route("/_healthz", get(health::liveness_handler))
        .route("/_readyz", get(health::readiness_handler));

    // Layers wrap inside-out: the first `.layer()` call sits closest to the
    // handler, the last one runs first.
    if state.config.enable_cors {
        router = router.layer(middleware::cors::layer(&state.config.allowed_origins));
    }
    if state.config.enable_security_headers {
        router = router.layer(from_fn_with_state(
            state.clone(),
            middleware::security_headers::layer,
        ));
    }
    if state.config.enable_csrf {
        router = router.layer(from_fn_with_state(state.clone(), middleware::csrf::layer));
    }
    router = router.layer(from_fn_with_state(
        state.clone(),
        middleware::rate_limit::layer,
    ));
    if state.config.enable_session {
        router = router.layer(from_fn_with_state(state.clone(), middleware::session::layer));
    }
    router = router.layer(from_fn(middleware::request_id::layer));
    if state.config.enable_access_log {
        router = router.layer(middleware::tracing::layer());
    }

    router.with_state(state)
}
