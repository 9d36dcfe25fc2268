//! Application layer: service orchestration over domain components.

pub mod services;
