//! Cache backend protocol.
//!
//! The client in `client.rs` only speaks this trait, so the Redis pool,
//! the in-process store and test doubles are interchangeable.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Failure talking to the backing store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Could not obtain or keep a connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// The store rejected or failed a command.
    #[error("command error: {0}")]
    Command(String),

    /// A command exceeded its socket deadline.
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
}

/// Server-side metrics as returned by INFO.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendInfo {
    pub connected_clients: u64,
    pub used_memory: u64,
    pub used_memory_human: String,
    pub keyspace_hits: u64,
    pub keyspace_misses: u64,
    pub total_commands_processed: u64,
    pub uptime_in_seconds: u64,
    pub redis_version: String,
}

/// Operations the cache client needs from its key-value store.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short label for logs ("redis", "memory").
    fn kind(&self) -> &'static str;

    async fn ping(&self) -> Result<(), BackendError>;

    /// GET
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// SETEX
    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool, BackendError>;

    /// DEL of one or more keys; returns how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64, BackendError>;

    /// EXISTS
    async fn exists(&self, key: &str) -> Result<bool, BackendError>;

    /// MGET; one slot per requested key, in order.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, BackendError>;

    /// Pipelined SETEX applied as one transaction; returns how many were written.
    async fn set_ex_many(
        &self,
        entries: Vec<(String, Vec<u8>)>,
        ttl: Duration,
    ) -> Result<usize, BackendError>;

    /// KEYS by Redis-style glob.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, BackendError>;

    /// INFO
    async fn info(&self) -> Result<BackendInfo, BackendError>;

    /// Release pooled connections.
    async fn close(&self) {}
}

impl std::fmt::Debug for dyn CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CacheBackend({})", self.kind())
    }
}

/// Render a byte count the way Redis formats `used_memory_human`.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [(&str, f64); 3] = [("G", 1024.0 * 1024.0 * 1024.0), ("M", 1024.0 * 1024.0), ("K", 1024.0)];
    for (suffix, size) in UNITS {
        if bytes as f64 >= size {
            return format!("{:.2}{}", bytes as f64 / size, suffix);
        }
    }
    format!("{}B", bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512B");
        assert_eq!(human_bytes(2048), "2.00K");
        assert_eq!(human_bytes(3 * 1024 * 1024 / 2), "1.50M");
    }
}
