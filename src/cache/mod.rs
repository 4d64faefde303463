//! Cache subsystem.
//!
//! # Data Flow
//! ```text
//! Service / middleware
//!     → read_through.rs or manager.rs (key scheme, invalidation policy)
//!     → client.rs (serialize, consult the breaker)
//!     → backend.rs trait
//!         → redis.rs (pooled Redis)
//!         → memory.rs (in-process)
//! ```
//!
//! # Design Decisions
//! - The cache is advisory: callers degrade to the source of truth on any cache error
//! - One breaker guards every backend operation of a cache instance
//! - The backend is chosen at startup and injected; nothing here is global

pub mod backend;
pub mod client;
pub mod fault;
pub mod manager;
pub mod memory;
pub mod read_through;
pub mod redis;

pub use backend::{BackendError, BackendInfo, CacheBackend};
pub use client::{Cache, CacheError};
pub use fault::FlakyBackend;
pub use manager::{cache_key, CacheManager};
pub use memory::MemoryBackend;
pub use read_through::cached_result;
pub use self::redis::RedisBackend;
