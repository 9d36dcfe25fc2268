//! CORS layer built from the configured origin allow-list.

use axum::http::{HeaderValue, Method, header::CONTENT_TYPE};
use tower_http::cors::{Any, CorsLayer};

/// Builds the CORS layer.
///
/// A literal `*` in the allow-list permits any origin (without credentials);
/// otherwise only the listed origins are allowed and credentials are
/// permitted so session cookies survive cross-origin storefront embeds.
/// Origins that fail header-value parsing are dropped with a warning.
pub fn layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([CONTENT_TYPE, super::csrf::CSRF_HEADER])
        .allow_credentials(true)
}
