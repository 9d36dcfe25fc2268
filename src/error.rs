//! Request-level error taxonomy and HTTP mapping.
//!
//! Startup configuration errors (bad TLS mode, unreachable backend dial) are
//! not represented here: they travel as `anyhow`/[`crate::infrastructure::backend::ChannelError`]
//! chains out of `server::run` and abort the process. This module covers the
//! recoverable per-request failures, mapped to short generic bodies.

use axum::{
    Json,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::OnceLock;
use thiserror::Error;

pub const HEADER_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const HEADER_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const HEADER_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Opt-in switch for exposing internal error detail in response bodies.
///
/// Off by default; set once at startup from configuration. Production traffic
/// always gets generic bodies.
static VERBOSE_ERRORS: OnceLock<bool> = OnceLock::new();

pub fn set_verbose_errors(verbose: bool) {
    let _ = VERBOSE_ERRORS.set(verbose);
}

fn verbose_errors() -> bool {
    VERBOSE_ERRORS.get().copied().unwrap_or(false)
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

#[derive(Serialize)]
struct ErrorInfo {
    code: &'static str,
    message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Admission check rejected the request. Carries everything needed for
    /// the rate-limit response headers.
    #[error("rate limit exceeded")]
    RateLimited {
        limit: u32,
        retry_after_secs: u64,
        /// Unix timestamp at which the client may retry.
        reset_at: i64,
    },

    /// CSRF token missing or not matching the cookie token.
    #[error("CSRF token validation failed")]
    CsrfRejected,

    /// Request body exceeded the buffering bound.
    #[error("request body too large")]
    PayloadTooLarge,

    #[error("{message}")]
    Internal { message: String },
}

impl AppError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::RateLimited {
                limit,
                retry_after_secs,
                reset_at,
            } => {
                let body = ErrorBody {
                    error: ErrorInfo {
                        code: "rate_limited",
                        message: "Too many requests. Please try again later.".to_string(),
                    },
                };
                let mut response =
                    (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                let headers = response.headers_mut();
                if let Ok(v) = HeaderValue::from_str(&limit.to_string()) {
                    headers.insert(HEADER_RATELIMIT_LIMIT, v);
                }
                headers.insert(HEADER_RATELIMIT_REMAINING, HeaderValue::from_static("0"));
                if let Ok(v) = HeaderValue::from_str(&reset_at.to_string()) {
                    headers.insert(HEADER_RATELIMIT_RESET, v);
                }
                if let Ok(v) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                    headers.insert(axum::http::header::RETRY_AFTER, v);
                }
                response
            }
            AppError::CsrfRejected => {
                let body = ErrorBody {
                    error: ErrorInfo {
                        code: "csrf_validation_failed",
                        message: "CSRF token validation failed".to_string(),
                    },
                };
                (StatusCode::FORBIDDEN, Json(body)).into_response()
            }
            AppError::PayloadTooLarge => {
                let body = ErrorBody {
                    error: ErrorInfo {
                        code: "payload_too_large",
                        message: "Request body too large".to_string(),
                    },
                };
                (StatusCode::PAYLOAD_TOO_LARGE, Json(body)).into_response()
            }
            AppError::Internal { message } => {
                tracing::error!(error = %message, "internal error");
                let exposed = if verbose_errors() {
                    message
                } else {
                    "Internal server error".to_string()
                };
                let body = ErrorBody {
                    error: ErrorInfo {
                        code: "internal_error",
                        message: exposed,
                    },
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::RETRY_AFTER;

    #[test]
    fn test_rate_limited_response_shape() {
        let error = AppError::RateLimited {
            limit: 20,
            retry_after_secs: 3,
            reset_at: 1_700_000_000,
        };

        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers.get(HEADER_RATELIMIT_LIMIT).unwrap(), "20");
        assert_eq!(headers.get(HEADER_RATELIMIT_REMAINING).unwrap(), "0");
        assert_eq!(headers.get(HEADER_RATELIMIT_RESET).unwrap(), "1700000000");
        assert_eq!(headers.get(RETRY_AFTER).unwrap(), "3");
    }

    #[test]
    fn test_csrf_rejection_is_forbidden() {
        let response = AppError::CsrfRejected.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_payload_too_large_status() {
        let response = AppError::PayloadTooLarge.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_internal_error_hides_detail_by_default() {
        let response = AppError::internal("pool exploded").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
