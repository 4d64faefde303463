//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to an external dependency (cache backend):
//!     → manager.rs (look up the breaker for the dependency name)
//!     → circuit_breaker.rs (fail fast if open, else run and record the outcome)
//!     → timeouts.rs (bound the call itself)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Circuit breaker prevents cascading failures
//! - Breakers are registered explicitly and shared through an injected manager

pub mod circuit_breaker;
pub mod manager;
pub mod timeouts;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerStats, CircuitState,
};
pub use manager::{BreakerHealth, CircuitBreakerManager};
pub use timeouts::{with_timeout, Elapsed};
