//! Concrete health checks.
//!
//! | check              | critical | timeout | degraded when                                  |
//! |--------------------|----------|---------|------------------------------------------------|
//! | `database`         | yes      | 5s      | expected collection missing, ping > 1s, list > 500ms |
//! | `cache`            | no       | 3s      | set+get+delete > 500ms                         |
//! | `filesystem`       | no       | 3s      | disk usage above the warning threshold         |
//! | `system_resources` | no       | 5s      | CPU or memory above the warning thresholds     |
//! | `circuit_breakers` | no       | 2s      | any breaker open                               |

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tokio::time::Instant;

use super::check::{round2, HealthCheck, HealthStatus, Probe, ProbeError};
use crate::cache::Cache;
use crate::config::HealthConfig;
use crate::resilience::CircuitBreakerManager;
use crate::store::DocumentStore;

const GB: f64 = 1024.0 * 1024.0 * 1024.0;

fn ms(duration: Duration) -> f64 {
    round2(duration.as_secs_f64() * 1000.0)
}

/// Datastore connectivity and expected collections.
pub struct DatabaseCheck {
    store: Arc<dyn DocumentStore>,
    expected_collections: Vec<String>,
    timeout: Duration,
}

impl DatabaseCheck {
    pub fn new(store: Arc<dyn DocumentStore>, config: &HealthConfig) -> Self {
        Self {
            store,
            expected_collections: config.expected_collections.clone(),
            timeout: Duration::from_secs(config.database_timeout_secs),
        }
    }
}

#[async_trait]
impl HealthCheck for DatabaseCheck {
    fn name(&self) -> &str {
        "database"
    }

    fn critical(&self) -> bool {
        true
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self) -> Result<Probe, ProbeError> {
        let started = Instant::now();
        self.store.ping().await?;
        let connection_time = started.elapsed();

        let started = Instant::now();
        let collections = self.store.list_collections().await?;
        let query_time = started.elapsed();

        let missing: Vec<&String> = self
            .expected_collections
            .iter()
            .filter(|c| !collections.contains(*c))
            .collect();

        let mut data = json!({
            "connection_time_ms": ms(connection_time),
            "query_time_ms": ms(query_time),
            "collections": collections,
        });

        if !missing.is_empty() {
            data["missing_collections"] = json!(missing);
            let names: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
            return Ok(Probe::new(
                HealthStatus::Degraded,
                format!("Missing collections: {}", names.join(", ")),
                data,
            ));
        }

        let (status, message) = if connection_time > Duration::from_secs(1) {
            (HealthStatus::Degraded, "Database connection is slow")
        } else if query_time > Duration::from_millis(500) {
            (HealthStatus::Degraded, "Database queries are slow")
        } else {
            (HealthStatus::Healthy, "Database is healthy")
        };
        Ok(Probe::new(status, message, data))
    }
}

/// Cache round trip through the breaker-protected client.
pub struct CacheCheck {
    cache: Arc<Cache>,
    timeout: Duration,
}

impl CacheCheck {
    const PROBE_KEY: &'static str = "health_check_test";

    pub fn new(cache: Arc<Cache>, config: &HealthConfig) -> Self {
        Self {
            cache,
            timeout: Duration::from_secs(config.cache_timeout_secs),
        }
    }

    async fn round_trip(&self, expected: &Value) -> Result<Probe, crate::cache::CacheError> {
        let started = Instant::now();
        self.cache
            .set(Self::PROBE_KEY, expected, Some(Duration::from_secs(10)))
            .await?;
        let set_time = started.elapsed();

        let started = Instant::now();
        let retrieved: Option<Value> = self.cache.get(Self::PROBE_KEY).await?;
        let get_time = started.elapsed();

        let started = Instant::now();
        self.cache.delete(Self::PROBE_KEY).await?;
        let delete_time = started.elapsed();

        let stats = self.cache.get_stats().await?;

        if retrieved.as_ref() != Some(expected) {
            return Ok(Probe::new(
                HealthStatus::Unhealthy,
                "Cache data integrity check failed",
                json!({ "expected": expected, "retrieved": retrieved }),
            ));
        }

        let total = set_time + get_time + delete_time;
        let (status, message) = if total > Duration::from_millis(500) {
            (HealthStatus::Degraded, "Cache operations are slow")
        } else {
            (HealthStatus::Healthy, "Cache is healthy")
        };

        Ok(Probe::new(
            status,
            message,
            json!({
                "set_time_ms": ms(set_time),
                "get_time_ms": ms(get_time),
                "delete_time_ms": ms(delete_time),
                "total_time_ms": ms(total),
                "backend": self.cache.backend_kind(),
                "redis_version": stats.redis_version,
                "used_memory": stats.used_memory_human,
                "connected_clients": stats.connected_clients,
                "keyspace_hits": stats.keyspace_hits,
                "keyspace_misses": stats.keyspace_misses,
            }),
        ))
    }
}

#[async_trait]
impl HealthCheck for CacheCheck {
    fn name(&self) -> &str {
        "cache"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self) -> Result<Probe, ProbeError> {
        let expected = json!({ "timestamp": Utc::now().timestamp_millis(), "check": "health" });
        match self.round_trip(&expected).await {
            Ok(probe) => Ok(probe),
            Err(e) => Ok(Probe::new(
                HealthStatus::Unhealthy,
                format!("Cache service unavailable: {}", e),
                json!({ "error": e.to_string() }),
            )),
        }
    }
}

/// Disk usage of the storage path plus a write/read/delete probe.
pub struct FilesystemCheck {
    path: PathBuf,
    warning_percent: f64,
    critical_percent: f64,
    timeout: Duration,
}

impl FilesystemCheck {
    const PROBE_FILE: &'static str = ".health_check_write_test";
    const PROBE_CONTENT: &'static str = "health check test";

    pub fn new(config: &HealthConfig) -> Self {
        Self {
            path: PathBuf::from(&config.storage_path),
            warning_percent: config.disk_warning_percent,
            critical_percent: config.disk_critical_percent,
            timeout: Duration::from_secs(config.filesystem_timeout_secs),
        }
    }

    fn classify(&self, used_percent: f64) -> (HealthStatus, &'static str) {
        if used_percent > self.critical_percent {
            (HealthStatus::Critical, "File system is critically full")
        } else if used_percent > self.warning_percent {
            (HealthStatus::Degraded, "File system usage is high")
        } else {
            (HealthStatus::Healthy, "File system is healthy")
        }
    }

    async fn write_probe(&self) -> Result<Duration, ProbeError> {
        let file = self.path.join(Self::PROBE_FILE);
        let started = Instant::now();
        tokio::fs::write(&file, Self::PROBE_CONTENT).await?;
        let content = tokio::fs::read_to_string(&file).await;
        tokio::fs::remove_file(&file).await?;
        if content? != Self::PROBE_CONTENT {
            return Err(ProbeError("File write/read integrity check failed".to_string()));
        }
        Ok(started.elapsed())
    }
}

/// (total, available) bytes of the disk whose mount point is the longest prefix of `path`.
fn disk_space(path: &Path) -> Option<(u64, u64)> {
    let path = path.canonicalize().ok()?;
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|d| path.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())
        .map(|d| (d.total_space(), d.available_space()))
}

#[async_trait]
impl HealthCheck for FilesystemCheck {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self) -> Result<Probe, ProbeError> {
        let path = self.path.clone();
        // Blocking tasks cannot be cancelled: on timeout the scan finishes in
        // the background and its result is dropped. One scan per probe bounds it.
        let space = tokio::task::spawn_blocking(move || disk_space(&path))
            .await
            .map_err(|e| ProbeError(e.to_string()))?;

        let (status, message, mut data) = match space {
            Some((total, available)) if total > 0 => {
                let used = total.saturating_sub(available);
                let used_percent = used as f64 / total as f64 * 100.0;
                let (status, message) = self.classify(used_percent);
                let data = json!({
                    "total_gb": round2(total as f64 / GB),
                    "used_gb": round2(used as f64 / GB),
                    "free_gb": round2(available as f64 / GB),
                    "used_percentage": round2(used_percent),
                });
                (status, message, data)
            }
            _ => (HealthStatus::Healthy, "File system is healthy", json!({})),
        };
        data["path"] = json!(self.path.display().to_string());

        match self.write_probe().await {
            Ok(write_time) => {
                data["write_time_ms"] = json!(ms(write_time));
                Ok(Probe::new(status, message, data))
            }
            Err(e) => {
                data["write_error"] = json!(e.0);
                Ok(Probe::new(
                    HealthStatus::Critical,
                    format!("File system write test failed: {}", e),
                    data,
                ))
            }
        }
    }
}

/// Host CPU and memory pressure.
pub struct SystemResourcesCheck {
    critical_percent: f64,
    cpu_warning_percent: f64,
    memory_warning_percent: f64,
    timeout: Duration,
}

impl SystemResourcesCheck {
    pub fn new(config: &HealthConfig) -> Self {
        Self {
            critical_percent: config.resource_critical_percent,
            cpu_warning_percent: config.cpu_warning_percent,
            memory_warning_percent: config.memory_warning_percent,
            timeout: Duration::from_secs(config.system_timeout_secs),
        }
    }

    fn classify(&self, cpu_percent: f64, memory_percent: f64) -> (HealthStatus, &'static str) {
        if cpu_percent > self.critical_percent || memory_percent > self.critical_percent {
            (HealthStatus::Critical, "System resources are critically high")
        } else if cpu_percent > self.cpu_warning_percent || memory_percent > self.memory_warning_percent {
            (HealthStatus::Degraded, "System resources are high")
        } else {
            (HealthStatus::Healthy, "System resources are healthy")
        }
    }
}

#[async_trait]
impl HealthCheck for SystemResourcesCheck {
    fn name(&self) -> &str {
        "system_resources"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self) -> Result<Probe, ProbeError> {
        // CPU usage is a delta between two refreshes.
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let cpu_percent = f64::from(sys.global_cpu_usage());
        let total = sys.total_memory();
        let available = sys.available_memory();
        let memory_percent = if total > 0 {
            total.saturating_sub(available) as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        let load = System::load_average();

        let (status, message) = self.classify(cpu_percent, memory_percent);
        Ok(Probe::new(
            status,
            message,
            json!({
                "cpu_percent": round2(cpu_percent),
                "cpu_count": sys.cpus().len(),
                "load_average": [load.one, load.five, load.fifteen],
                "memory_percent": round2(memory_percent),
                "memory_total_gb": round2(total as f64 / GB),
                "memory_available_gb": round2(available as f64 / GB),
                "memory_used_gb": round2(total.saturating_sub(available) as f64 / GB),
            }),
        ))
    }
}

/// Summary of every registered circuit breaker.
pub struct CircuitBreakerCheck {
    manager: Arc<CircuitBreakerManager>,
    timeout: Duration,
}

impl CircuitBreakerCheck {
    pub fn new(manager: Arc<CircuitBreakerManager>, config: &HealthConfig) -> Self {
        Self {
            manager,
            timeout: Duration::from_secs(config.circuit_breaker_timeout_secs),
        }
    }
}

#[async_trait]
impl HealthCheck for CircuitBreakerCheck {
    fn name(&self) -> &str {
        "circuit_breakers"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self) -> Result<Probe, ProbeError> {
        let health = self.manager.health();
        let (status, message) = if health.healthy {
            (HealthStatus::Healthy, "All circuit breakers are healthy".to_string())
        } else {
            (
                HealthStatus::Degraded,
                format!("Circuit breakers open: {}", health.open_circuit_names.join(", ")),
            )
        };
        let data = serde_json::to_value(&health).map_err(|e| ProbeError(e.to_string()))?;
        Ok(Probe::new(status, message, data))
    }
}
