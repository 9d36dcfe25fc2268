//! Admission-control middleware over the token bucket limiter groups.
//!
//! Expensive endpoints (checkout and friends, per configuration) are routed to
//! the stricter `expensive` group; everything else hits `default`. Rejected
//! requests get `429` with `Retry-After` and the `X-RateLimit-*` headers;
//! admitted requests carry `X-RateLimit-Limit`/`-Remaining` so well-behaved
//! clients can pace themselves.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

use crate::config::{Config, DEFAULT_LIMITER_GROUP, EXPENSIVE_LIMITER_GROUP};
use crate::error::{AppError, HEADER_RATELIMIT_LIMIT, HEADER_RATELIMIT_REMAINING};
use crate::state::{AppState, RequestContext};

pub async fn layer(
    State(st): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client_ip = client_ip(&st.config, &req);
    let session_id = req
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.session_id.clone())
        .filter(|sid| !sid.is_empty());

    let path = req.uri().path();
    let group = if st.config.expensive_paths.iter().any(|p| p == path) {
        EXPENSIVE_LIMITER_GROUP
    } else {
        DEFAULT_LIMITER_GROUP
    };

    match st.limiters.check(group, &client_ip, session_id.as_deref()) {
        Some(decision) if !decision.allowed => {
            metrics::counter!("rate_limit_rejections_total", "group" => group).increment(1);
            tracing::warn!(
                target: "security_event",
                client_ip = %client_ip,
                group,
                path = %path,
                retry_after_secs = decision.retry_after_secs(),
                "rate limit exceeded"
            );
            Err(AppError::RateLimited {
                limit: decision.limit,
                retry_after_secs: decision.retry_after_secs(),
                reset_at: chrono::Utc::now().timestamp() + decision.reset_after.as_secs() as i64,
            })
        }
        Some(decision) => {
            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            if let Ok(v) = HeaderValue::from_str(&decision.limit.to_string()) {
                headers.insert(HEADER_RATELIMIT_LIMIT, v);
            }
            if let Ok(v) = HeaderValue::from_str(&decision.remaining.to_string()) {
                headers.insert(HEADER_RATELIMIT_REMAINING, v);
            }
            Ok(response)
        }
        // Limiting disabled or unknown group: pass through untouched.
        None => Ok(next.run(req).await),
    }
}

/// Resolves the client IP used for limiter keying.
///
/// `X-Forwarded-For` (first hop) and `X-Real-IP` are honored only when
/// `BEHIND_PROXY` is set; otherwise any client could spoof its way into a
/// fresh bucket. Falls back to the socket peer address.
fn client_ip(config: &Config, req: &Request) -> String {
    if config.behind_proxy {
        if let Some(forwarded) = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            && let Some(first) = forwarded.split(',').next().map(str::trim)
            && !first.is_empty()
        {
            return first.to_string();
        }
        if let Some(real_ip) = req
            .headers()
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            && !real_ip.is_empty()
        {
            return real_ip.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    fn request_with_headers(pairs: &[(&str, &str)]) -> Request {
        let mut builder = HttpRequest::builder().uri("/");
        for (name, value) in pairs {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn config(behind_proxy: bool) -> Config {
        use crate::domain::ratelimit::{GroupPolicy, KeySource};
        use crate::infrastructure::backend::{BackendAddrs, TlsMode};
        use std::time::Duration;

        Config {
            listen_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            production: false,
            behind_proxy,
            cookie_max_age_secs: 172_800,
            shared_session: false,
            rate_limit_disabled: false,
            limiter_groups: vec![GroupPolicy {
                name: DEFAULT_LIMITER_GROUP.to_string(),
                burst: 20,
                rate_per_sec: 1.67,
                key_source: KeySource::SessionAndIp,
            }],
            expensive_paths: vec![],
            sweep_interval: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(180),
            backend_tls_mode: TlsMode::Insecure,
            backend_tls_ca_cert: None,
            backend_addrs: BackendAddrs {
                product_catalog: "catalog:3550".to_string(),
                currency: "currency:7000".to_string(),
                cart: "cart:7070".to_string(),
            },
            connect_timeout: Duration::from_secs(3),
            readiness_timeout: Duration::from_secs(2),
            allowed_origins: vec![],
            enable_access_log: true,
            enable_session: true,
            enable_csrf: true,
            enable_security_headers: true,
            enable_cors: true,
            verbose_errors: false,
        }
    }

    #[test]
    fn test_client_ip_ignores_forwarding_headers_without_proxy() {
        let req = request_with_headers(&[("x-forwarded-for", "203.0.113.7")]);
        assert_eq!(client_ip(&config(false), &req), "unknown");
    }

    #[test]
    fn test_client_ip_takes_first_forwarded_hop_behind_proxy() {
        let req =
            request_with_headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1, 10.0.0.2")]);
        assert_eq!(client_ip(&config(true), &req), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_falls_back_to_real_ip_header() {
        let req = request_with_headers(&[("x-real-ip", "198.51.100.4")]);
        assert_eq!(client_ip(&config(true), &req), "198.51.100.4");
    }

    #[test]
    fn test_client_ip_uses_peer_address_when_available() {
        let mut req = request_with_headers(&[]);
        let addr: SocketAddr = "192.0.2.10:55123".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(client_ip(&config(false), &req), "192.0.2.10");
    }
}
