//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, apply environment overrides, and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    load_config_with_env(path, |var| std::env::var(var).ok())
}

/// [`load_config`] with an explicit environment lookup.
pub fn load_config_with_env<F>(path: &Path, lookup: F) -> Result<ServiceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let content = fs::read_to_string(path)?;
    let config: ServiceConfig = toml::from_str(&content)?;
    finalize(config, lookup)
}

/// Defaults plus environment overrides, for running without a config file.
pub fn load_from_env() -> Result<ServiceConfig, ConfigError> {
    finalize(ServiceConfig::default(), |var| std::env::var(var).ok())
}

fn finalize<F>(mut config: ServiceConfig, lookup: F) -> Result<ServiceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply the supported environment variables on top of a parsed config.
///
/// `lookup` abstracts `std::env::var` so tests do not touch process state.
pub fn apply_env_overrides<F>(config: &mut ServiceConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("REDIS_HOST") {
        config.redis.host = host;
    }
    if let Some(port) = lookup("REDIS_PORT") {
        config.redis.port = parse_env("REDIS_PORT", port)?;
    }
    if let Some(password) = lookup("REDIS_PASSWORD") {
        config.redis.password = Some(password).filter(|p| !p.is_empty());
    }
    if let Some(db) = lookup("REDIS_DB") {
        config.redis.db = parse_env("REDIS_DB", db)?;
    }
    if let Some(ttl) = lookup("CACHE_DEFAULT_TTL") {
        config.redis.default_ttl_secs = parse_env("CACHE_DEFAULT_TTL", ttl)?;
    }
    if let Some(debug) = lookup("DEBUG") {
        config.admin.debug = parse_bool("DEBUG", debug)?;
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}

fn parse_bool(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Env { var, value }),
    }
}
