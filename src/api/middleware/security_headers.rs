//! Browser security response headers.
//!
//! Applied to every response that reaches this stage of the pipeline.
//! `Strict-Transport-Security` is only emitted in a secure context; sending
//! it over plain HTTP would be ignored at best.

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, header},
    middleware::Next,
    response::Response,
};

use super::is_secure_context;
use crate::state::AppState;

pub async fn layer(State(st): State<AppState>, req: Request, next: Next) -> Response {
    let secure = is_secure_context(&st.config, req.headers());
    let mut response = next.run(req).await;

    let headers = response.headers_mut();
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'; frame-ancestors 'none'"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("camera=(), geolocation=(), microphone=()"),
    );
    // Explicitly disable the legacy XSS auditor; CSP supersedes it.
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("0"),
    );
    if secure {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }
    response
}
