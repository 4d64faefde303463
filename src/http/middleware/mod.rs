//! Cache-aware request pipeline stages.
//!
//! ```text
//! request → response_cache (GET on cacheable route: replay or record)
//!         → invalidation (successful mutation: clear related keys)
//!         → handler
//! ```
//!
//! Both stages are fail-open: a cache error is logged and the request
//! proceeds as if no cache were configured.

pub mod invalidation;
pub mod response_cache;

pub use invalidation::invalidate_cache;
pub use response_cache::{response_cache, response_cache_key, CachedResponse};
