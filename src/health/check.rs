//! Health check protocol and the timeout wrapper every check runs under.
//!
//! # Responsibilities
//! - Define statuses, probe outcomes and the reported result shape
//! - Bound each probe by its own timeout and turn timeouts and errors
//!   into typed results instead of propagating them
//!
//! # Design Decisions
//! - A timed-out probe future is dropped, cancelling its in-flight I/O
//! - Failures of a check marked critical report Critical, others Unhealthy

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::cache::CacheError;
use crate::observability::metrics;
use crate::resilience::with_timeout;
use crate::store::StoreError;

/// Health of one subsystem, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Critical => "critical",
        }
    }

    /// Unhealthy or Critical; served with 503 by the health API.
    pub fn is_failing(&self) -> bool {
        matches!(self, HealthStatus::Unhealthy | HealthStatus::Critical)
    }

    fn gauge_value(&self) -> f64 {
        match self {
            HealthStatus::Healthy => 0.0,
            HealthStatus::Degraded => 1.0,
            HealthStatus::Unhealthy => 2.0,
            HealthStatus::Critical => 3.0,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a probe observed.
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    pub status: HealthStatus,
    pub message: String,
    pub data: Value,
}

impl Probe {
    pub fn new(status: HealthStatus, message: impl Into<String>, data: Value) -> Self {
        Self {
            status,
            message: message.into(),
            data,
        }
    }

    pub fn healthy(message: impl Into<String>, data: Value) -> Self {
        Self::new(HealthStatus::Healthy, message, data)
    }
}

/// A probe could not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ProbeError(pub String);

impl From<StoreError> for ProbeError {
    fn from(err: StoreError) -> Self {
        ProbeError(err.to_string())
    }
}

impl From<CacheError> for ProbeError {
    fn from(err: CacheError) -> Self {
        ProbeError(err.to_string())
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        ProbeError(err.to_string())
    }
}

/// Reported outcome of one check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub name: String,
    pub status: HealthStatus,
    pub message: String,
    pub data: Value,
    pub duration_ms: f64,
    pub timestamp: DateTime<Utc>,
    pub critical: bool,
}

/// One independently probed subsystem.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;

    /// Whether a failure of this check escalates the overall status to Critical.
    fn critical(&self) -> bool {
        false
    }

    fn timeout(&self) -> Duration;

    async fn probe(&self) -> Result<Probe, ProbeError>;
}

/// Run `check` under its timeout, converting every failure into a result.
pub async fn run_check(check: &dyn HealthCheck) -> HealthCheckResult {
    let started = Instant::now();
    let timeout = check.timeout();
    let failed_status = if check.critical() {
        HealthStatus::Critical
    } else {
        HealthStatus::Unhealthy
    };

    let (status, message, data) = match with_timeout(timeout, check.probe()).await {
        Ok(Ok(probe)) => (probe.status, probe.message, probe.data),
        Ok(Err(e)) => {
            tracing::error!(check = check.name(), error = %e, "Health check failed");
            (failed_status, format!("Check failed: {}", e), json!({ "error": e.0 }))
        }
        Err(_) => {
            tracing::warn!(check = check.name(), timeout_secs = timeout.as_secs_f64(), "Health check timed out");
            (
                failed_status,
                format!("Check timed out after {}s", timeout.as_secs_f64()),
                json!({}),
            )
        }
    };

    let duration = started.elapsed();
    metrics::record_health_check(check.name(), status.gauge_value(), duration);

    HealthCheckResult {
        name: check.name().to_string(),
        status,
        message,
        data,
        duration_ms: round2(duration.as_secs_f64() * 1000.0),
        timestamp: Utc::now(),
        critical: check.critical(),
    }
}

/// Round to two decimals for reporting.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
