//! HTTP API layer: handlers, DTOs, and the edge middleware stack.

pub mod dto;
pub mod handlers;
pub mod middleware;
