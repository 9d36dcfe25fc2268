//! CSRF protection via the double-submit cookie pattern.
//!
//! Any request lacking a token cookie receives a random token in a
//! JavaScript-readable cookie, including rejected mutations; mutating methods
//! must echo that token back in the `csrf_token` form field or the
//! `X-CSRF-Token` header. The server holds no token state, so the check
//! survives restarts and scales horizontally.
//!
//! The token cookie is deliberately **not** `HttpOnly`: front-end code must be
//! able to read it to reflect it into requests. `SameSite=Strict` keeps
//! cross-site requests from carrying it at all.

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{
        HeaderName, HeaderValue, Method,
        header::{CONTENT_TYPE, SET_COOKIE},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use super::{CSRF_COOKIE, build_cookie, cookie_value, is_secure_context};
use crate::error::AppError;
use crate::state::AppState;

/// Header fallback for clients that do not submit forms.
pub const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");
/// Form field carrying the token on urlencoded submissions.
pub const CSRF_FORM_FIELD: &str = "csrf_token";

const CSRF_TOKEN_BYTES: usize = 32;
/// Cap on buffered form bodies during token extraction.
const MAX_FORM_BYTES: usize = 64 * 1024;

pub async fn layer(
    State(st): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let cookie_token = cookie_value(req.headers(), CSRF_COOKIE).filter(|t| !t.is_empty());
    let secure = is_secure_context(&st.config, req.headers());

    // A client without a token cookie gets one on ANY request, even a
    // rejected mutation, so the 403 response already carries the token
    // needed for the retry.
    let issued = match &cookie_token {
        Some(_) => None,
        None => Some(mint_token()?),
    };

    let outcome = if is_mutating(req.method()) {
        validate(cookie_token, req, next).await
    } else {
        Ok(next.run(req).await)
    };

    let mut response = outcome.unwrap_or_else(|err| err.into_response());
    if let Some(token) = issued {
        let cookie = build_cookie(
            CSRF_COOKIE,
            &token,
            st.config.cookie_max_age_secs,
            "Strict",
            false,
            secure,
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    Ok(response)
}

async fn validate(
    cookie_token: Option<String>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = cookie_token else {
        return Err(reject("missing token cookie"));
    };

    let (parts, body) = req.into_parts();

    let is_form = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    // The form body must be buffered to read the token; it is replayed into
    // the request afterwards so handlers still see the full body. Bodies over
    // the cap are refused outright.
    let (body, form_token) = if is_form {
        let bytes = to_bytes(body, MAX_FORM_BYTES)
            .await
            .map_err(|_| AppError::PayloadTooLarge)?;
        let token = url::form_urlencoded::parse(&bytes)
            .find(|(key, _)| key == CSRF_FORM_FIELD)
            .map(|(_, value)| value.into_owned());
        (Body::from(bytes), token)
    } else {
        (body, None)
    };

    let submitted = form_token.or_else(|| {
        parts
            .headers
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });

    match submitted {
        Some(token) if token == expected => {
            metrics::counter!("csrf_validation_successes_total").increment(1);
            let req = Request::from_parts(parts, body);
            Ok(next.run(req).await)
        }
        Some(_) => Err(reject("token mismatch")),
        None => Err(reject("no token submitted")),
    }
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Mints a fresh token from the OS entropy source. Fails closed: if entropy
/// is unavailable the request errors rather than issuing a weak token.
fn mint_token() -> Result<String, AppError> {
    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    getrandom::fill(&mut bytes)
        .map_err(|e| AppError::internal(format!("entropy source unavailable: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

fn reject(reason: &str) -> AppError {
    metrics::counter!("csrf_validation_failures_total").increment(1);
    tracing::warn!(target: "security_event", reason, "CSRF validation failed");
    AppError::CsrfRejected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_token_is_url_safe_and_unique() {
        let a = mint_token().unwrap();
        let b = mint_token().unwrap();

        assert_ne!(a, b);
        // 32 bytes, unpadded base64.
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_mutating_methods() {
        assert!(is_mutating(&Method::POST));
        assert!(is_mutating(&Method::PUT));
        assert!(is_mutating(&Method::PATCH));
        assert!(is_mutating(&Method::DELETE));
        assert!(!is_mutating(&Method::GET));
        assert!(!is_mutating(&Method::HEAD));
        assert!(!is_mutating(&Method::OPTIONS));
    }
}
