//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: probing whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold (since last close)
//! Open → Half-Open: recovery_timeout elapsed since last failure (checked lazily on the next call)
//! Half-Open → Closed: success_threshold successes
//! Half-Open → Open: any counted failure
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency name, shared through the manager
//! - Bookkeeping happens under a short lock; the wrapped call runs outside it
//! - Which errors count as failures is decided by a predicate at the call site
//! - No timer task: recovery is evaluated when the next call arrives

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::observability::metrics;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Label used in logs, metrics and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    fn gauge_value(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by [`CircuitBreaker::call`].
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// The breaker is open; the operation was not attempted.
    #[error("circuit breaker '{name}' is open")]
    Open { name: String },

    /// The operation ran and returned this error.
    #[error(transparent)]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// True if the call was rejected without running.
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open { .. })
    }
}

/// Breaker thresholds. Immutable once the breaker is built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures since the last close before the circuit opens.
    pub failure_threshold: u32,

    /// Seconds to wait after the last failure before probing.
    pub recovery_timeout_secs: u64,

    /// Successes required in Half-Open before closing.
    pub success_threshold: u32,
}

impl CircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout_secs: 30,
            success_threshold: 2,
        }
    }
}

/// Point-in-time view of a breaker, as reported by the admin and health APIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub total_requests: u64,
    pub state_changes: u64,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    /// Monotonic clock of the last counted failure; drives recovery.
    last_failure: Option<Instant>,
    last_failure_time: Option<DateTime<Utc>>,
    last_success_time: Option<DateTime<Utc>>,
    total_requests: u64,
    state_changes: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure: None,
            last_failure_time: None,
            last_success_time: None,
            total_requests: 0,
            state_changes: 0,
        }
    }
}

/// Failure-tracking guard around calls to a single named dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        tracing::info!(
            name = %name,
            failure_threshold = config.failure_threshold,
            recovery_timeout_secs = config.recovery_timeout_secs,
            success_threshold = config.success_threshold,
            "Circuit breaker initialized"
        );
        metrics::record_circuit_state(&name, CircuitState::Closed.gauge_value());

        Self {
            name,
            config,
            inner: Mutex::new(BreakerState::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state, without evaluating any pending transition.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Run `operation`, counting every error as a dependency failure.
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.call_classified(operation, |_| true).await
    }

    /// Run `operation`; only errors for which `is_failure` returns true
    /// are recorded against the circuit. Other errors pass through untouched.
    pub async fn call_classified<T, E, F, Fut, P>(
        &self,
        operation: F,
        is_failure: P,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: fmt::Display,
    {
        self.before_call()?;

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) if is_failure(&err) => {
                self.on_failure();
                Err(CircuitBreakerError::Inner(err))
            }
            Err(err) => {
                tracing::error!(
                    name = %self.name,
                    error = %err,
                    "Unexpected error in circuit breaker call"
                );
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    /// Evaluate pending transitions and decide whether the call may proceed.
    fn before_call<E>(&self) -> Result<(), CircuitBreakerError<E>> {
        let mut inner = self.lock();
        inner.total_requests += 1;

        let current = inner.state;
        match current {
            CircuitState::Closed if inner.failure_count >= self.config.failure_threshold => {
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Open if self.should_attempt_reset(&inner) => {
                self.transition(&mut inner, CircuitState::HalfOpen);
            }
            _ => {}
        }

        if inner.state == CircuitState::Open {
            tracing::warn!(
                name = %self.name,
                failure_count = inner.failure_count,
                "Circuit breaker open - failing fast"
            );
            metrics::record_circuit_rejection(&self.name);
            return Err(CircuitBreakerError::Open {
                name: self.name.clone(),
            });
        }

        Ok(())
    }

    fn should_attempt_reset(&self, inner: &BreakerState) -> bool {
        inner
            .last_failure
            .map(|at| at.elapsed() >= self.config.recovery_timeout())
            .unwrap_or(false)
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        inner.success_count += 1;
        inner.last_success_time = Some(Utc::now());

        if inner.state == CircuitState::HalfOpen
            && inner.success_count >= self.config.success_threshold
        {
            self.transition(&mut inner, CircuitState::Closed);
        }

        tracing::debug!(
            name = %self.name,
            state = %inner.state,
            success_count = inner.success_count,
            "Circuit breaker call succeeded"
        );
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());
        inner.last_failure_time = Some(Utc::now());

        let current = inner.state;
        match current {
            CircuitState::HalfOpen => self.transition(&mut inner, CircuitState::Open),
            CircuitState::Closed if inner.failure_count >= self.config.failure_threshold => {
                self.transition(&mut inner, CircuitState::Open)
            }
            _ => {}
        }

        tracing::warn!(
            name = %self.name,
            state = %inner.state,
            failure_count = inner.failure_count,
            "Circuit breaker call failed"
        );
    }

    /// Apply a state change. Caller holds the lock.
    fn transition(&self, inner: &mut BreakerState, to: CircuitState) {
        if inner.state == to {
            return;
        }
        inner.state = to;
        inner.state_changes += 1;

        match to {
            CircuitState::Open => {
                tracing::warn!(
                    name = %self.name,
                    failure_count = inner.failure_count,
                    recovery_timeout_secs = self.config.recovery_timeout_secs,
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                inner.success_count = 0;
                tracing::info!(name = %self.name, "Circuit breaker half-opened - testing recovery");
            }
            CircuitState::Closed => {
                inner.failure_count = 0;
                inner.success_count = 0;
                inner.last_failure = None;
                inner.last_failure_time = None;
                tracing::info!(name = %self.name, "Circuit breaker closed - dependency recovered");
            }
        }

        metrics::record_circuit_transition(&self.name, to.as_str(), to.gauge_value());
    }

    /// Force the circuit open (maintenance, tests).
    ///
    /// The recovery clock is not touched: a breaker that never saw a failure
    /// stays open until [`force_close`](Self::force_close).
    pub fn force_open(&self) {
        let mut inner = self.lock();
        self.transition(&mut inner, CircuitState::Open);
        tracing::warn!(name = %self.name, "Circuit breaker manually opened");
    }

    /// Force the circuit closed and clear failure bookkeeping.
    pub fn force_close(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::Closed {
            inner.failure_count = 0;
            inner.last_failure = None;
            inner.last_failure_time = None;
        } else {
            self.transition(&mut inner, CircuitState::Closed);
        }
        tracing::info!(name = %self.name, "Circuit breaker manually closed");
    }

    /// Snapshot of counters and state.
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.lock();
        CircuitBreakerStats {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            total_requests: inner.total_requests,
            state_changes: inner.state_changes,
            last_failure_time: inner.last_failure_time,
            last_success_time: inner.last_success_time,
            failure_threshold: self.config.failure_threshold,
            recovery_timeout_secs: self.config.recovery_timeout_secs,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // Counters stay usable even if a holder panicked.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config(failure_threshold: u32, recovery_timeout_secs: u64, success_threshold: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            recovery_timeout_secs,
            success_threshold,
        }
    }

    async fn fail(cb: &CircuitBreaker) -> Result<(), CircuitBreakerError<String>> {
        cb.call(|| async { Err::<(), _>("backend down".to_string()) }).await
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<(), CircuitBreakerError<String>> {
        cb.call(|| async { Ok::<_, String>(()) }).await
    }

    #[tokio::test]
    async fn test_starts_closed_and_passes_calls() {
        let cb = CircuitBreaker::new("test", config(3, 30, 2));
        assert_eq!(cb.state(), CircuitState::Closed);

        let result = cb.call(|| async { Ok::<_, String>(42) }).await;
        assert_eq!(result.unwrap(), 42);

        let stats = cb.stats();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.success_count, 1);
        assert!(stats.last_success_time.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_and_fails_fast() {
        let cb = CircuitBreaker::new("redis-cache", config(3, 30, 2));
        for _ in 0..3 {
            assert!(matches!(fail(&cb).await, Err(CircuitBreakerError::Inner(_))));
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let invoked = AtomicU32::new(0);
        let result = cb
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            })
            .await;
        assert!(matches!(result, Err(CircuitBreakerError::Open { .. })));
        assert_eq!(invoked.load(Ordering::SeqCst), 0, "operation must not run while open");
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_probe_after_recovery_timeout() {
        let cb = CircuitBreaker::new("redis-cache", config(3, 30, 2));
        for _ in 0..3 {
            let _ = fail(&cb).await;
        }
        assert!(fail(&cb).await.unwrap_err().is_open());

        tokio::time::advance(Duration::from_secs(31)).await;

        let invoked = AtomicU32::new(0);
        let result = cb
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(invoked.load(Ordering::SeqCst), 1, "probe must reach the dependency");
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_closes_after_success_threshold() {
        let cb = CircuitBreaker::new("test", config(1, 10, 2));
        let _ = fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(10)).await;
        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);

        let stats = cb.stats();
        assert_eq!(stats.failure_count, 0);
        assert!(stats.last_failure_time.is_none());
        // Closed -> Open -> HalfOpen -> Closed
        assert_eq!(stats.state_changes, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let cb = CircuitBreaker::new("test", config(1, 10, 2));
        let _ = fail(&cb).await;
        tokio::time::advance(Duration::from_secs(11)).await;

        assert!(matches!(fail(&cb).await, Err(CircuitBreakerError::Inner(_))));
        assert_eq!(cb.state(), CircuitState::Open);

        // Recovery clock restarted by the failed probe.
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(succeed(&cb).await.unwrap_err().is_open());
    }

    #[tokio::test]
    async fn test_unclassified_errors_do_not_trip() {
        let cb = CircuitBreaker::new("test", config(1, 30, 1));
        for _ in 0..5 {
            let result = cb
                .call_classified(|| async { Err::<(), _>("bad input".to_string()) }, |_| false)
                .await;
            assert!(matches!(result, Err(CircuitBreakerError::Inner(_))));
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats().failure_count, 0);
    }

    #[tokio::test]
    async fn test_force_operations() {
        let cb = CircuitBreaker::new("test", config(5, 30, 1));

        cb.force_open();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(succeed(&cb).await.unwrap_err().is_open());

        cb.force_close();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(succeed(&cb).await.is_ok());
    }
}
