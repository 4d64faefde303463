//! Concurrent execution and aggregation of health checks.
//!
//! # Responsibilities
//! - Run every registered check concurrently and wait for all of them
//! - Fold per-check statuses into one overall status
//! - Reuse the last full report for a short window unless forced
//!
//! # Design Decisions
//! - Precedence: Critical (a critical check reporting Critical), then
//!   Unhealthy, then Degraded, then Healthy
//! - A Critical result from a non-critical check is tallied in the summary
//!   but does not affect the overall status
//! - The report cache is evaluated lazily; there is no refresh task

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::check::{round2, run_check, HealthCheck, HealthCheckResult, HealthStatus};

/// Counts by status over one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub total_checks: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub critical: usize,
    /// Names of critical checks that reported Critical.
    pub critical_failures: Vec<String>,
}

/// Aggregated outcome of all checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall_status: HealthStatus,
    pub overall_message: String,
    pub timestamp: DateTime<Utc>,
    pub total_duration_ms: f64,
    pub checks: Vec<HealthCheckResult>,
    pub summary: HealthSummary,
}

impl HealthReport {
    /// Critical checks whose status is Unhealthy or Critical.
    pub fn critical_systems(&self) -> Vec<&HealthCheckResult> {
        self.checks
            .iter()
            .filter(|c| c.critical && c.status.is_failing())
            .collect()
    }
}

/// Fold individual results into a report.
pub fn aggregate(checks: Vec<HealthCheckResult>, total_duration: Duration) -> HealthReport {
    let mut critical_failures = Vec::new();
    let mut unhealthy = 0;
    let mut degraded = 0;

    for check in &checks {
        match check.status {
            HealthStatus::Critical if check.critical => critical_failures.push(check.name.clone()),
            // Non-critical checks reporting Critical do not move the overall status.
            HealthStatus::Critical => {}
            HealthStatus::Unhealthy => unhealthy += 1,
            HealthStatus::Degraded => degraded += 1,
            HealthStatus::Healthy => {}
        }
    }

    let (overall_status, overall_message) = if !critical_failures.is_empty() {
        (
            HealthStatus::Critical,
            format!("Critical failures in: {}", critical_failures.join(", ")),
        )
    } else if unhealthy > 0 {
        (HealthStatus::Unhealthy, format!("{} systems are unhealthy", unhealthy))
    } else if degraded > 0 {
        (HealthStatus::Degraded, format!("{} systems are degraded", degraded))
    } else {
        (HealthStatus::Healthy, "All systems are healthy".to_string())
    };

    let count = |status: HealthStatus| checks.iter().filter(|c| c.status == status).count();
    let summary = HealthSummary {
        total_checks: checks.len(),
        healthy: count(HealthStatus::Healthy),
        degraded: count(HealthStatus::Degraded),
        unhealthy: count(HealthStatus::Unhealthy),
        critical: count(HealthStatus::Critical),
        critical_failures,
    };

    HealthReport {
        overall_status,
        overall_message,
        timestamp: Utc::now(),
        total_duration_ms: round2(total_duration.as_secs_f64() * 1000.0),
        checks,
        summary,
    }
}

struct CachedReport {
    at: Instant,
    report: HealthReport,
}

/// Owns the registered checks and the short-lived report cache.
pub struct HealthCheckManager {
    checks: Vec<Arc<dyn HealthCheck>>,
    window: Duration,
    last: Mutex<Option<CachedReport>>,
}

impl std::fmt::Debug for HealthCheckManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthCheckManager")
            .field("checks", &self.check_names())
            .field("window", &self.window)
            .finish()
    }
}

impl HealthCheckManager {
    pub fn new(window: Duration) -> Self {
        Self {
            checks: Vec::new(),
            window,
            last: Mutex::new(None),
        }
    }

    /// Register a check (builder pattern).
    pub fn with_check(mut self, check: Arc<dyn HealthCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn check_names(&self) -> Vec<String> {
        self.checks.iter().map(|c| c.name().to_string()).collect()
    }

    /// Run every check concurrently, or return the cached report if it is
    /// younger than the window and `force` is false.
    pub async fn run_all_checks(&self, force: bool) -> HealthReport {
        // Held across the run so concurrent callers share one execution.
        let mut last = self.last.lock().await;
        if !force {
            if let Some(cached) = last.as_ref().filter(|c| c.at.elapsed() < self.window) {
                return cached.report.clone();
            }
        }

        let started = Instant::now();
        let results = join_all(self.checks.iter().map(|check| run_check(check.as_ref()))).await;
        let report = aggregate(results, started.elapsed());

        tracing::info!(
            overall_status = %report.overall_status,
            total_checks = report.summary.total_checks,
            critical_failures = report.summary.critical_failures.len(),
            duration_ms = report.total_duration_ms,
            "Health check completed"
        );

        *last = Some(CachedReport {
            at: Instant::now(),
            report: report.clone(),
        });
        report
    }

    /// Run one check by name. `None` if no such check is registered.
    pub async fn run_single_check(&self, name: &str) -> Option<HealthCheckResult> {
        let check = self.checks.iter().find(|c| c.name() == name)?;
        Some(run_check(check.as_ref()).await)
    }
}
