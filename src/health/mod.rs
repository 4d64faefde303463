//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /api/v1/health
//!     → manager.rs: cached report younger than the window? return it
//!     → run every check concurrently (check.rs applies each timeout)
//!     → checks.rs probes database, cache, filesystem, system, breakers
//!     → aggregate into one overall status
//! ```
//!
//! # Design Decisions
//! - Checks never propagate errors; failures become results
//! - Only checks marked critical can drive the overall status to Critical
//! - Health is computed on request, there is no background prober

pub mod check;
pub mod checks;
pub mod manager;

pub use check::{run_check, HealthCheck, HealthCheckResult, HealthStatus, Probe, ProbeError};
pub use checks::{CacheCheck, CircuitBreakerCheck, DatabaseCheck, FilesystemCheck, SystemResourcesCheck};
pub use manager::{aggregate, HealthCheckManager, HealthReport, HealthSummary};
