//! HTTP request handlers.

pub mod health;
