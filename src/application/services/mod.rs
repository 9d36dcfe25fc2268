//! Application services orchestrating domain components.

pub mod health_service;

pub use health_service::{DependencyStatus, HealthReport, HealthService};
