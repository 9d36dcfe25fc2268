//! Request identifier middleware.
//!
//! Assigns every request a UUID, seeds the [`RequestContext`] extension with
//! it, and echoes it back in the `X-Request-Id` response header so support
//! tickets can be matched to log lines.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::state::RequestContext;

pub const HEADER_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

pub async fn layer(mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    req.extensions_mut().insert(RequestContext {
        request_id: request_id.clone(),
        session_id: String::new(),
    });

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(HEADER_REQUEST_ID, value);
    }
    response
}
