//! Circuit-breaker-protected cache client.
//!
//! # Responsibilities
//! - JSON (de)serialization of cached values
//! - Route every backend call through the cache breaker
//! - Self-heal corrupt entries by deleting them on read
//!
//! # Design Decisions
//! - Serialization happens before the breaker is consulted, so a value that
//!   cannot be encoded never counts as a dependency failure
//! - Initialization is lazy and idempotent; the first operation pings the backend
//! - A miss is `Ok(None)`, never an error

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::backend::{BackendError, BackendInfo, CacheBackend};
use crate::observability::metrics;
use crate::resilience::{CircuitBreaker, CircuitBreakerError};

/// Errors surfaced by [`Cache`].
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backend could not be reached or rejected the command.
    #[error("cache backend error: {0}")]
    Backend(#[from] BackendError),

    /// The value could not be encoded. Local; never trips the breaker.
    #[error("failed to serialize value for key '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The breaker is open; the backend was not contacted.
    #[error("circuit breaker '{0}' is open")]
    CircuitOpen(String),
}

impl CacheError {
    /// Whether this error should be recorded against the cache breaker.
    pub fn counts_as_failure(&self) -> bool {
        matches!(self, CacheError::Backend(_))
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CacheError::CircuitOpen(_))
    }
}

impl From<CircuitBreakerError<CacheError>> for CacheError {
    fn from(err: CircuitBreakerError<CacheError>) -> Self {
        match err {
            CircuitBreakerError::Open { name } => CacheError::CircuitOpen(name),
            CircuitBreakerError::Inner(inner) => inner,
        }
    }
}

/// Async key-value client over a [`CacheBackend`].
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
    breaker: Arc<CircuitBreaker>,
    default_ttl: Duration,
    initialized: AtomicBool,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("backend", &self.backend.kind())
            .field("breaker", &self.breaker.name())
            .field("default_ttl", &self.default_ttl)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheBackend>, breaker: Arc<CircuitBreaker>, default_ttl: Duration) -> Self {
        Self {
            backend,
            breaker,
            default_ttl,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn backend_kind(&self) -> &'static str {
        self.backend.kind()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Verify connectivity. Idempotent: returns immediately once it has succeeded.
    pub async fn initialize(&self) -> Result<(), CacheError> {
        if self.is_initialized() {
            return Ok(());
        }

        let result = self
            .breaker
            .call_classified(
                || async { self.backend.ping().await.map_err(CacheError::from) },
                CacheError::counts_as_failure,
            )
            .await
            .map_err(CacheError::from);

        match result {
            Ok(()) => {
                self.initialized.store(true, Ordering::Release);
                tracing::info!(
                    backend = self.backend.kind(),
                    default_ttl_secs = self.default_ttl.as_secs(),
                    "Cache initialized"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(backend = self.backend.kind(), error = %e, "Failed to initialize cache");
                Err(e)
            }
        }
    }

    /// Release backend connections and mark the cache uninitialized.
    ///
    /// A closed Redis pool cannot be reopened; call this only on shutdown.
    pub async fn close(&self) {
        self.backend.close().await;
        self.initialized.store(false, Ordering::Release);
        tracing::info!(backend = self.backend.kind(), "Cache connection closed");
    }

    /// Run one backend operation behind initialization and the breaker.
    async fn guarded<T, F, Fut>(&self, op: &'static str, operation: F) -> Result<T, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        self.initialize().await?;

        let result = self
            .breaker
            .call_classified(
                move || async move { operation().await.map_err(CacheError::from) },
                CacheError::counts_as_failure,
            )
            .await
            .map_err(CacheError::from);

        match &result {
            Ok(_) => metrics::record_cache_op(op, "ok"),
            Err(CacheError::CircuitOpen(_)) => metrics::record_cache_op(op, "rejected"),
            Err(e) => {
                tracing::error!(op, error = %e, "Cache operation failed");
                metrics::record_cache_op(op, "error");
            }
        }
        result
    }

    /// Fetch and decode `key`. Absent, expired or undecodable values are `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let Some(bytes) = self.guarded("get", || self.backend.get(key)).await? else {
            tracing::debug!(key, "Cache miss");
            return Ok(None);
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                tracing::debug!(key, "Cache hit");
                Ok(Some(value))
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Corrupt cache entry, deleting");
                if let Err(del) = self.delete(key).await {
                    tracing::warn!(key, error = %del, "Failed to delete corrupt cache entry");
                }
                Ok(None)
            }
        }
    }

    /// Encode and store `value` under `key`, using the default TTL when `ttl` is `None`.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        let bytes = serde_json::to_vec(value).map_err(|source| {
            tracing::error!(key, error = %source, "Failed to serialize cache value");
            CacheError::Serialization {
                key: key.to_string(),
                source,
            }
        })?;
        let ttl = ttl.unwrap_or(self.default_ttl);

        let stored = self
            .guarded("set", || self.backend.set_ex(key, bytes, ttl))
            .await?;
        tracing::debug!(key, ttl_secs = ttl.as_secs(), "Cache set");
        Ok(stored)
    }

    /// Returns whether the key existed.
    pub async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let keys = [key.to_string()];
        let removed = self.guarded("delete", || self.backend.delete(&keys)).await?;
        tracing::debug!(key, existed = removed > 0, "Cache key deleted");
        Ok(removed > 0)
    }

    pub async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.guarded("exists", || self.backend.exists(key)).await
    }

    /// Values for the keys that are present and decodable.
    pub async fn get_many<T: DeserializeOwned>(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, T>, CacheError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let values = self.guarded("get_many", || self.backend.mget(keys)).await?;
        let mut found = HashMap::with_capacity(values.len());
        for (key, value) in keys.iter().zip(values) {
            let Some(bytes) = value else { continue };
            match serde_json::from_slice(&bytes) {
                Ok(decoded) => {
                    found.insert(key.clone(), decoded);
                }
                Err(e) => tracing::warn!(key = %key, error = %e, "Skipping corrupt cache entry"),
            }
        }

        tracing::debug!(requested = keys.len(), found = found.len(), "Batch cache get");
        Ok(found)
    }

    /// Store several values in one atomic batch.
    ///
    /// Values that fail to encode are skipped. Returns true only if every
    /// encodable value was written; false if nothing was left to write.
    pub async fn set_many<K, V, I>(&self, entries: I, ttl: Option<Duration>) -> Result<bool, CacheError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Serialize,
    {
        let mut encoded = Vec::new();
        for (key, value) in entries {
            let key = key.into();
            match serde_json::to_vec(&value) {
                Ok(bytes) => encoded.push((key, bytes)),
                Err(e) => tracing::error!(key = %key, error = %e, "Skipping value that failed to serialize"),
            }
        }

        if encoded.is_empty() {
            tracing::warn!("No values to cache after serialization");
            return Ok(false);
        }

        let expected = encoded.len();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let written = self
            .guarded("set_many", || self.backend.set_ex_many(encoded, ttl))
            .await?;
        tracing::debug!(total_keys = expected, written, ttl_secs = ttl.as_secs(), "Batch cache set");
        Ok(written == expected)
    }

    /// Delete every key matching a Redis glob. Returns how many were removed.
    pub async fn clear_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let keys = self.guarded("keys", || self.backend.keys(pattern)).await?;
        if keys.is_empty() {
            tracing::debug!(pattern, "No keys found for pattern");
            return Ok(0);
        }

        let removed = self.guarded("delete", || self.backend.delete(&keys)).await?;
        tracing::info!(pattern, keys_deleted = removed, "Cache pattern cleared");
        Ok(removed)
    }

    /// Backend server metrics.
    pub async fn get_stats(&self) -> Result<BackendInfo, CacheError> {
        self.guarded("stats", || self.backend.info()).await
    }
}
