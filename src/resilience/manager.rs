//! Registry of named circuit breakers.
//!
//! # Responsibilities
//! - Get-or-create a breaker per dependency name
//! - Aggregate breaker health for the health subsystem and admin API
//!
//! # Design Decisions
//! - Config is honored only on first creation; later callers share the existing breaker
//! - Constructed once at startup and passed by `Arc`, never a global

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};

/// Aggregate view over every registered breaker.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerHealth {
    pub total_circuits: usize,
    pub open_circuits: usize,
    pub open_circuit_names: Vec<String>,
    pub healthy: bool,
    pub stats: BTreeMap<String, CircuitBreakerStats>,
}

#[derive(Debug, Default)]
pub struct CircuitBreakerManager {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the breaker registered under `name`, creating it with `config` if absent.
    pub fn get_or_create(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.value().clone();
        }

        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!(name = %name, "Created new circuit breaker");
                Arc::new(CircuitBreaker::new(name, config))
            })
            .value()
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|b| b.value().clone())
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Stats for every breaker, keyed by name.
    pub fn all_stats(&self) -> BTreeMap<String, CircuitBreakerStats> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats()))
            .collect()
    }

    /// Healthy means no breaker is currently open.
    pub fn health(&self) -> BreakerHealth {
        let stats = self.all_stats();
        let open_circuit_names: Vec<String> = stats
            .values()
            .filter(|s| s.state == CircuitState::Open)
            .map(|s| s.name.clone())
            .collect();

        BreakerHealth {
            total_circuits: stats.len(),
            open_circuits: open_circuit_names.len(),
            healthy: open_circuit_names.is_empty(),
            open_circuit_names,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let manager = CircuitBreakerManager::new();
        let first = manager.get_or_create(
            "redis-cache",
            CircuitBreakerConfig {
                failure_threshold: 3,
                recovery_timeout_secs: 30,
                success_threshold: 2,
            },
        );
        let second = manager.get_or_create("redis-cache", CircuitBreakerConfig::default());

        assert!(Arc::ptr_eq(&first, &second));
        // First config wins.
        assert_eq!(second.config().failure_threshold, 3);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_health_reports_open_breakers() {
        let manager = CircuitBreakerManager::new();
        manager.get_or_create("a", CircuitBreakerConfig::default());
        let b = manager.get_or_create("b", CircuitBreakerConfig::default());

        let health = manager.health();
        assert!(health.healthy);
        assert_eq!(health.total_circuits, 2);

        b.force_open();
        let health = manager.health();
        assert!(!health.healthy);
        assert_eq!(health.open_circuits, 1);
        assert_eq!(health.open_circuit_names, vec!["b".to_string()]);
        assert_eq!(health.stats["b"].state, CircuitState::Open);
    }
}
