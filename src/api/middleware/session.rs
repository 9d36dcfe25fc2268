//! Session establishment middleware.
//!
//! Every browser gets a session identifier on first contact. Returning
//! visitors present it via the session cookie; the middleware never re-issues
//! an identifier it already received, so carts stay stable across requests.
//!
//! # Cookie Format
//!
//! ```text
//! Set-Cookie: shop_session-id=<uuid>; Path=/; Max-Age=172800; SameSite=Lax; HttpOnly[; Secure]
//! ```
//!
//! `Secure` is set only in a secure context (see
//! [`super::is_secure_context`]): stamping it unconditionally would strand the
//! cookie on plain-HTTP dev setups.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header::SET_COOKIE},
    middleware::Next,
    response::Response,
};

use super::{SESSION_COOKIE, build_cookie, cookie_value, is_secure_context};
use crate::domain::session::SessionRecord;
use crate::state::{AppState, RequestContext};

pub async fn layer(State(st): State<AppState>, mut req: Request, next: Next) -> Response {
    let presented = cookie_value(req.headers(), SESSION_COOKIE).filter(|s| !s.is_empty());

    let (record, minted) = match presented {
        Some(sid) => (SessionRecord::existing(sid), false),
        None => (SessionRecord::mint(st.config.shared_session), true),
    };
    let session_id = record.session_id;

    match req.extensions_mut().get_mut::<RequestContext>() {
        Some(ctx) => ctx.session_id = session_id.clone(),
        // Identity stage disabled: carry the session alone.
        None => {
            req.extensions_mut().insert(RequestContext {
                request_id: String::new(),
                session_id: session_id.clone(),
            });
        }
    }

    let secure = is_secure_context(&st.config, req.headers());
    let mut response = next.run(req).await;

    if minted {
        let cookie = build_cookie(
            SESSION_COOKIE,
            &session_id,
            st.config.cookie_max_age_secs,
            "Lax",
            true,
            secure,
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}
