//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::resilience::CircuitBreakerConfig;

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Cache backend connection.
    pub redis: RedisConfig,

    /// Breaker guarding every cache backend call.
    pub circuit_breaker: CircuitBreakerConfig,

    /// HTTP response cache middleware.
    pub http_cache: HttpCacheConfig,

    /// Health check manager and per-check thresholds.
    pub health: HealthConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Administrative switches.
    pub admin: AdminConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Total time allowed per request, in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            request_timeout_secs: 30,
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

/// Redis connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Use Redis; when false the in-process backend is used instead.
    pub enabled: bool,

    pub host: String,

    pub port: u16,

    /// Optional AUTH password. Escaped when the URL is built.
    pub password: Option<String>,

    /// Logical database index (0-15).
    pub db: u8,

    /// Upper bound on pooled connections.
    pub max_connections: usize,

    /// Timeout for establishing or checking out a connection, in seconds.
    pub connect_timeout_secs: u64,

    /// Per-command socket deadline, in seconds.
    pub command_timeout_secs: u64,

    /// TTL applied when a caller does not pass one, in seconds.
    pub default_ttl_secs: u64,
}

impl RedisConfig {
    /// Connection URL with the password percent-escaped.
    pub fn url(&self) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("redis://{}:{}/{}", self.host, self.port, self.db))?;
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            url.set_password(Some(password))
                .map_err(|()| url::ParseError::EmptyHost)?;
        }
        Ok(url)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
            max_connections: 10,
            connect_timeout_secs: 5,
            command_timeout_secs: 5,
            default_ttl_secs: 3600,
        }
    }
}

/// HTTP response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpCacheConfig {
    pub enabled: bool,

    /// Path prefixes whose GET responses may be cached.
    pub cacheable_routes: Vec<String>,

    /// TTL for responses that match no known category, in seconds.
    pub default_ttl_secs: u64,

    /// Include the sorted query string in the cache key.
    pub cache_query_params: bool,

    /// Request headers folded into the cache key. Matched case-insensitively.
    pub key_headers: Vec<String>,

    /// Largest response body stored, in bytes. Bigger responses pass through uncached.
    pub max_response_bytes: usize,
}

impl Default for HttpCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cacheable_routes: vec![
                "/api/v1/files/".to_string(),
                "/api/v1/paths/".to_string(),
                "/api/v1/health/".to_string(),
            ],
            default_ttl_secs: 300,
            cache_query_params: true,
            key_headers: vec![
                "accept".to_string(),
                "accept-language".to_string(),
                "accept-encoding".to_string(),
            ],
            max_response_bytes: 1024 * 1024,
        }
    }
}

/// Health subsystem configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// How long a full report is reused before checks run again, in seconds.
    pub cache_window_secs: u64,

    /// Directory probed by the filesystem check.
    pub storage_path: String,

    /// Collections the database check expects to find.
    pub expected_collections: Vec<String>,

    pub database_timeout_secs: u64,
    pub cache_timeout_secs: u64,
    pub filesystem_timeout_secs: u64,
    pub system_timeout_secs: u64,
    pub circuit_breaker_timeout_secs: u64,

    /// Disk usage above this is Critical.
    pub disk_critical_percent: f64,
    /// Disk usage above this is Degraded.
    pub disk_warning_percent: f64,

    /// CPU or memory above this is Critical.
    pub resource_critical_percent: f64,
    pub cpu_warning_percent: f64,
    pub memory_warning_percent: f64,
}

impl HealthConfig {
    pub fn cache_window(&self) -> Duration {
        Duration::from_secs(self.cache_window_secs)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            cache_window_secs: 30,
            storage_path: "./data".to_string(),
            expected_collections: vec!["files".to_string(), "paths".to_string()],
            database_timeout_secs: 5,
            cache_timeout_secs: 3,
            filesystem_timeout_secs: 3,
            system_timeout_secs: 5,
            circuit_breaker_timeout_secs: 2,
            disk_critical_percent: 95.0,
            disk_warning_percent: 70.0,
            resource_critical_percent: 95.0,
            cpu_warning_percent: 80.0,
            memory_warning_percent: 85.0,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Administrative switches.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Allows clearing the whole cache and inspecting raw keys.
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config: ServiceConfig = toml::from_str("").unwrap();
        assert_eq!(config.redis.port, 6379);
        assert_eq!(config.redis.default_ttl_secs, 3600);
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.recovery_timeout_secs, 30);
        assert_eq!(config.http_cache.cacheable_routes.len(), 3);
        assert_eq!(config.health.cache_window_secs, 30);
        assert!(!config.admin.debug);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [redis]
            host = "cache.internal"

            [circuit_breaker]
            failure_threshold = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.redis.host, "cache.internal");
        assert_eq!(config.redis.max_connections, 10);
        assert_eq!(config.circuit_breaker.failure_threshold, 7);
        assert_eq!(config.circuit_breaker.success_threshold, 2);
    }

    #[test]
    fn test_redis_url_escapes_password() {
        let config = RedisConfig {
            host: "redis".to_string(),
            port: 6380,
            password: Some("p@ss:w/rd".to_string()),
            db: 2,
            ..RedisConfig::default()
        };
        let url = config.url().unwrap();
        assert_eq!(url.as_str(), "redis://:p%40ss%3Aw%2Frd@redis:6380/2");
    }

    #[test]
    fn test_redis_url_without_password() {
        let url = RedisConfig::default().url().unwrap();
        assert_eq!(url.as_str(), "redis://localhost:6379/0");
    }
}
