//! Liveness and readiness endpoints.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::api::dto::health::HealthResponse;
use crate::state::AppState;

/// Liveness probe: `GET /_healthz`.
///
/// Answers as long as the process is serving requests; never consults
/// backend dependencies.
pub async fn liveness_handler() -> &'static str {
    "ok"
}

/// Readiness probe: `GET /_readyz`.
///
/// Probes every backend dependency concurrently under the configured deadline
/// and reports per-dependency outcomes.
///
/// # Responses
///
/// - `200 OK` - every dependency answered in time
/// - `503 Service Unavailable` - at least one dependency failed or timed out
pub async fn readiness_handler(State(st): State<AppState>) -> impl IntoResponse {
    let report = st.health.readiness().await;
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(HealthResponse::from(report)))
}

/// `GET /robots.txt` - keeps crawlers away from the storefront edge.
pub async fn robots_handler() -> &'static str {
    "User-agent: *\nDisallow: /"
}
