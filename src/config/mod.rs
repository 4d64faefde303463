//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), or defaults when none is given
//!     → loader.rs (parse, deserialize, apply environment overrides)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_with_env, load_from_env, ConfigError};
pub use schema::{
    AdminConfig, HealthConfig, HttpCacheConfig, ObservabilityConfig, RedisConfig, ServerConfig,
    ServiceConfig,
};
