//! Health check response DTOs.

use serde::Serialize;

use crate::application::services::{DependencyStatus, HealthReport};

/// Readiness response body listing every dependency check.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub checks: Vec<HealthCheck>,
}

/// Outcome of a single dependency probe.
#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<HealthReport> for HealthResponse {
    fn from(report: HealthReport) -> Self {
        Self {
            status: status_str(report.healthy),
            checks: report.checks.into_iter().map(HealthCheck::from).collect(),
        }
    }
}

impl From<DependencyStatus> for HealthCheck {
    fn from(status: DependencyStatus) -> Self {
        Self {
            name: status.name,
            status: status_str(status.healthy),
            error: status.error,
        }
    }
}

fn status_str(healthy: bool) -> &'static str {
    if healthy { "healthy" } else { "unhealthy" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy_check_omits_error_field() {
        let check = HealthCheck::from(DependencyStatus {
            name: "currency".to_string(),
            healthy: true,
            error: None,
        });

        let json = serde_json::to_string(&check).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(!json.contains("error"));
    }

    #[test]
    fn test_unhealthy_report_serialization() {
        let response = HealthResponse::from(HealthReport {
            healthy: false,
            checks: vec![DependencyStatus {
                name: "cart".to_string(),
                healthy: false,
                error: Some("connection refused".to_string()),
            }],
        });

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"unhealthy\""));
        assert!(json.contains("connection refused"));
    }
}
