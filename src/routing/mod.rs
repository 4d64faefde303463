//! Request classification for the HTTP cache layers.
//!
//! # Data Flow
//! ```text
//! GET request
//!     → matcher.rs (is the path under a cacheable route?)
//!     → policy.rs (which TTL category does the cache key fall into?)
//!
//! Successful POST/PUT/PATCH/DELETE
//!     → policy.rs (resource name in path → key patterns to clear)
//! ```
//!
//! # Design Decisions
//! - Routes compiled from config at startup, immutable at runtime
//! - No regex (prefix and substring matching only)
//! - Unmatched mutations clear the whole response namespace

pub mod matcher;
pub mod policy;

pub use matcher::{is_mutating, CacheableRoutes, PathPrefixMatcher};
pub use policy::{invalidation_patterns, ttl_for_key, HTTP_CACHE_NAMESPACE};
