//! Operational API: cache management and health reporting.
//!
//! # Data Flow
//! ```text
//! /api/v1/cache/*  → cache.rs  → Cache / CacheManager (503 when unavailable)
//! /api/v1/health/* → health.rs → HealthCheckManager, DocumentStore
//! ```
//!
//! # Design Decisions
//! - Destructive or revealing operations (clear everything, read raw keys)
//!   require `admin.debug`
//! - Health endpoints answer 503 for Unhealthy and Critical so load
//!   balancers can act on the status code alone

pub mod cache;
pub mod health;

use axum::Router;

use crate::http::server::AppState;

pub fn setup_admin_router() -> Router<AppState> {
    cache::routes().merge(health::routes())
}
