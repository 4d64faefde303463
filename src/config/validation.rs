//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, ports valid, pool bounds)
//! - Reject cacheable routes that could never match a request path
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;

/// A single semantic problem, tagged with the offending field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be greater than 0"));
    }

    let redis = &config.redis;
    if redis.port == 0 {
        errors.push(ValidationError::new("redis.port", "must be between 1 and 65535"));
    }
    if !(1..=100).contains(&redis.max_connections) {
        errors.push(ValidationError::new("redis.max_connections", "must be between 1 and 100"));
    }
    if redis.db > 15 {
        errors.push(ValidationError::new("redis.db", "must be between 0 and 15"));
    }
    if redis.default_ttl_secs == 0 {
        errors.push(ValidationError::new("redis.default_ttl_secs", "must be greater than 0"));
    }
    if redis.command_timeout_secs == 0 {
        errors.push(ValidationError::new("redis.command_timeout_secs", "must be greater than 0"));
    }
    if redis.enabled && redis.url().is_err() {
        errors.push(ValidationError::new(
            "redis.host",
            format!("'{}' does not form a valid redis URL", redis.host),
        ));
    }

    let breaker = &config.circuit_breaker;
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.failure_threshold", "must be greater than 0"));
    }
    if breaker.success_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.success_threshold", "must be greater than 0"));
    }
    if breaker.recovery_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.recovery_timeout_secs",
            "must be greater than 0",
        ));
    }

    let http_cache = &config.http_cache;
    if http_cache.default_ttl_secs == 0 {
        errors.push(ValidationError::new("http_cache.default_ttl_secs", "must be greater than 0"));
    }
    if http_cache.max_response_bytes == 0 {
        errors.push(ValidationError::new("http_cache.max_response_bytes", "must be greater than 0"));
    }
    for route in &http_cache.cacheable_routes {
        if !route.starts_with('/') {
            errors.push(ValidationError::new(
                "http_cache.cacheable_routes",
                format!("'{}' must start with '/'", route),
            ));
        }
    }

    let health = &config.health;
    if health.cache_window_secs == 0 {
        errors.push(ValidationError::new("health.cache_window_secs", "must be greater than 0"));
    }
    if health.disk_warning_percent >= health.disk_critical_percent {
        errors.push(ValidationError::new(
            "health.disk_warning_percent",
            "must be below disk_critical_percent",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ServiceConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ServiceConfig::default();
        config.redis.max_connections = 0;
        config.redis.db = 16;
        config.circuit_breaker.failure_threshold = 0;
        config.http_cache.cacheable_routes.push("api/v1/other".to_string());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "redis.max_connections",
                "redis.db",
                "circuit_breaker.failure_threshold",
                "http_cache.cacheable_routes",
            ]
        );
    }

    #[test]
    fn test_max_connections_upper_bound() {
        let mut config = ServiceConfig::default();
        config.redis.max_connections = 101;
        assert!(validate_config(&config).is_err());
        config.redis.max_connections = 100;
        assert!(validate_config(&config).is_ok());
    }
}
