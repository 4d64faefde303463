//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! cache client, breakers, health checks, response cache
//!     → logging.rs (tracing subscriber, JSON or pretty)
//!     → metrics.rs (cache, breaker and health series)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Request spans carry the request id; see `http::request`
//! - Nothing is recorded until a recorder is installed

pub mod logging;
pub mod metrics;
