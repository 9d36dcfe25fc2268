//! Readiness aggregation over injected dependency probes.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::domain::probe::DependencyProbe;

/// Result of probing one dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyStatus {
    pub name: String,
    pub healthy: bool,
    pub error: Option<String>,
}

/// Aggregate readiness across all dependencies.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub healthy: bool,
    pub checks: Vec<DependencyStatus>,
}

/// Runs all dependency probes concurrently under one bounded deadline.
///
/// Aggregate status is healthy iff every probe succeeds within the deadline.
/// A probe that exceeds the deadline counts as failed and is not retried
/// within the same readiness check; there is no partial-ready state.
pub struct HealthService {
    probes: Vec<Arc<dyn DependencyProbe>>,
    deadline: Duration,
}

impl HealthService {
    pub fn new(probes: Vec<Arc<dyn DependencyProbe>>, deadline: Duration) -> Self {
        Self { probes, deadline }
    }

    /// Probes every dependency concurrently and aggregates the outcome.
    ///
    /// Checks are returned sorted by dependency name so the readiness body is
    /// stable across calls.
    pub async fn readiness(&self) -> HealthReport {
        let mut tasks = JoinSet::new();
        for probe in &self.probes {
            let probe = probe.clone();
            let deadline = self.deadline;
            tasks.spawn(async move {
                let name = probe.name().to_string();
                let error = match tokio::time::timeout(deadline, probe.check()).await {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(format!("{e:#}")),
                    Err(_) => Some(format!(
                        "probe exceeded the {}ms readiness deadline",
                        deadline.as_millis()
                    )),
                };
                DependencyStatus {
                    name,
                    healthy: error.is_none(),
                    error,
                }
            });
        }

        let mut checks = Vec::with_capacity(self.probes.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(status) => checks.push(status),
                Err(e) => checks.push(DependencyStatus {
                    name: "internal".to_string(),
                    healthy: false,
                    error: Some(format!("probe task failed: {e}")),
                }),
            }
        }
        checks.sort_by(|a, b| a.name.cmp(&b.name));

        let healthy = checks.iter().all(|c| c.healthy);
        for check in checks.iter().filter(|c| !c.healthy) {
            tracing::warn!(
                dependency = %check.name,
                error = check.error.as_deref().unwrap_or("unknown"),
                "readiness check failed"
            );
        }

        HealthReport { healthy, checks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::probe::MockDependencyProbe;
    use anyhow::anyhow;
    use async_trait::async_trait;

    fn mock_probe(name: &str, result: Result<(), String>) -> Arc<dyn DependencyProbe> {
        let mut probe = MockDependencyProbe::new();
        probe.expect_name().return_const(name.to_string());
        match result {
            Ok(()) => {
                probe.expect_check().returning(|| Ok(()));
            }
            Err(message) => {
                probe
                    .expect_check()
                    .returning(move || Err(anyhow!(message.clone())));
            }
        }
        Arc::new(probe)
    }

    /// Probe that never answers inside any reasonable deadline.
    struct StalledProbe;

    #[async_trait]
    impl DependencyProbe for StalledProbe {
        fn name(&self) -> &str {
            "cart"
        }

        async fn check(&self) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_all_probes_healthy() {
        let service = HealthService::new(
            vec![
                mock_probe("product_catalog", Ok(())),
                mock_probe("currency", Ok(())),
                mock_probe("cart", Ok(())),
            ],
            Duration::from_secs(2),
        );

        let report = service.readiness().await;

        assert!(report.healthy);
        assert_eq!(report.checks.len(), 3);
        assert!(report.checks.iter().all(|c| c.healthy && c.error.is_none()));
    }

    #[tokio::test]
    async fn test_one_failing_probe_marks_not_ready() {
        let service = HealthService::new(
            vec![
                mock_probe("product_catalog", Ok(())),
                mock_probe("currency", Err("connection refused".to_string())),
            ],
            Duration::from_secs(2),
        );

        let report = service.readiness().await;

        assert!(!report.healthy);
        let failed = report
            .checks
            .iter()
            .find(|c| c.name == "currency")
            .expect("currency check present");
        assert!(!failed.healthy);
        assert!(failed.error.as_deref().unwrap().contains("connection refused"));

        // The healthy dependency is still reported as such.
        let ok = report
            .checks
            .iter()
            .find(|c| c.name == "product_catalog")
            .expect("catalog check present");
        assert!(ok.healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_exceeding_deadline_counts_as_failed() {
        let service = HealthService::new(
            vec![mock_probe("currency", Ok(())), Arc::new(StalledProbe)],
            Duration::from_secs(2),
        );

        let report = service.readiness().await;

        assert!(!report.healthy);
        let stalled = report
            .checks
            .iter()
            .find(|c| c.name == "cart")
            .expect("cart check present");
        assert!(!stalled.healthy);
        assert!(stalled.error.as_deref().unwrap().contains("deadline"));
    }

    #[tokio::test]
    async fn test_checks_sorted_by_name() {
        let service = HealthService::new(
            vec![
                mock_probe("currency", Ok(())),
                mock_probe("cart", Ok(())),
                mock_probe("product_catalog", Ok(())),
            ],
            Duration::from_secs(2),
        );

        let report = service.readiness().await;
        let names: Vec<_> = report.checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["cart", "currency", "product_catalog"]);
    }

    #[tokio::test]
    async fn test_no_probes_is_trivially_healthy() {
        let service = HealthService::new(vec![], Duration::from_secs(2));
        let report = service.readiness().await;
        assert!(report.healthy);
        assert!(report.checks.is_empty());
    }
}
