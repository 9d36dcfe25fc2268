//! Edge middleware: request identity, admission control, CSRF protection,
//! and browser security headers.
//!
//! Every stage is an axum `from_fn` middleware wired in
//! [`crate::routes::app_router`]. Stages share the cookie helpers below so the
//! session and CSRF cookies agree on attributes and secure-context detection.

use axum::http::{HeaderMap, header::COOKIE};

use crate::config::Config;

pub mod cors;
pub mod csrf;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;
pub mod tracing;

/// Session identifier cookie name.
pub const SESSION_COOKIE: &str = "shop_session-id";
/// CSRF double-submit token cookie name.
pub const CSRF_COOKIE: &str = "shop_csrf-token";

/// Extracts a named cookie from the `Cookie` header.
///
/// Splits on semicolons and ignores unrelated cookies.
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(COOKIE)
        .and_then(|cookie_header| cookie_header.to_str().ok())
        .and_then(|cookie_str| {
            cookie_str.split(';').find_map(|cookie| {
                let mut parts = cookie.trim().splitn(2, '=');
                match (parts.next(), parts.next()) {
                    (Some(key), Some(value)) if key == name => Some(value.to_string()),
                    _ => None,
                }
            })
        })
}

/// Whether the request arrived over a channel where the `Secure` cookie
/// attribute will not strand the cookie.
///
/// True when the deployment is marked production, or when a trusting reverse
/// proxy reports `X-Forwarded-Proto: https`.
pub(crate) fn is_secure_context(config: &Config, headers: &HeaderMap) -> bool {
    if config.production {
        return true;
    }
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("https"))
        .unwrap_or(false)
}

/// Serializes a `Set-Cookie` value with the edge's standard attributes.
pub(crate) fn build_cookie(
    name: &str,
    value: &str,
    max_age_secs: i64,
    same_site: &str,
    http_only: bool,
    secure: bool,
) -> String {
    let mut cookie = format!("{name}={value}; Path=/; Max-Age={max_age_secs}; SameSite={same_site}");
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_value_picks_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("other=1; shop_session-id=abc-123; trailing=x"),
        );

        assert_eq!(
            cookie_value(&headers, SESSION_COOKIE).as_deref(),
            Some("abc-123")
        );
        assert_eq!(cookie_value(&headers, CSRF_COOKIE), None);
    }

    #[test]
    fn test_build_cookie_attributes() {
        let cookie = build_cookie("shop_session-id", "abc", 172_800, "Lax", true, true);
        assert_eq!(
            cookie,
            "shop_session-id=abc; Path=/; Max-Age=172800; SameSite=Lax; HttpOnly; Secure"
        );

        let insecure = build_cookie("shop_csrf-token", "t", 60, "Strict", false, false);
        assert!(!insecure.contains("HttpOnly"));
        assert!(!insecure.contains("Secure"));
    }
}
