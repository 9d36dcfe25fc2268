//! # shop-edge
//!
//! Edge security layer for a multi-backend storefront: session establishment,
//! token bucket rate limiting, CSRF protection, browser security headers, and
//! dependency-aware health reporting, assembled as one middleware pipeline
//! around an injected business router.
//!
//! ## Architecture
//!
//! The crate follows a layered layout:
//!
//! - [`domain`] - core types and policies (token buckets, sessions, probes)
//! - [`application`] - services orchestrating domain components
//! - [`infrastructure`] - outbound concerns (backend channels, TLS)
//! - [`api`] - HTTP handlers, DTOs, and the middleware stack
//!
//! ## Usage
//!
//! ```rust,ignore
//! let config = shop_edge::config::load_from_env()?;
//! let business = storefront_router();
//! shop_edge::server::run(config, business).await?;
//! ```

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod routes;
pub mod server;
pub mod state;
