//! Fault-injecting backend wrapper.
//!
//! Wraps another backend and fails every call while switched on, so tests
//! can take the cache "down" and bring it back without a real server.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::backend::{BackendError, BackendInfo, CacheBackend};

#[derive(Debug)]
pub struct FlakyBackend {
    inner: Arc<dyn CacheBackend>,
    failing: AtomicBool,
    calls: AtomicU64,
}

impl FlakyBackend {
    pub fn new(inner: Arc<dyn CacheBackend>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
            calls: AtomicU64::new(0),
        }
    }

    /// While true, every call returns a connection error without reaching the inner backend.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Calls that reached this wrapper, failing or not.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(BackendError::Connection("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheBackend for FlakyBackend {
    fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.check()?;
        self.inner.ping().await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool, BackendError> {
        self.check()?;
        self.inner.set_ex(key, value, ttl).await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, BackendError> {
        self.check()?;
        self.inner.delete(keys).await
    }

    async fn exists(&self, key: &str) -> Result<bool, BackendError> {
        self.check()?;
        self.inner.exists(key).await
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, BackendError> {
        self.check()?;
        self.inner.mget(keys).await
    }

    async fn set_ex_many(
        &self,
        entries: Vec<(String, Vec<u8>)>,
        ttl: Duration,
    ) -> Result<usize, BackendError> {
        self.check()?;
        self.inner.set_ex_many(entries, ttl).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, BackendError> {
        self.check()?;
        self.inner.keys(pattern).await
    }

    async fn info(&self) -> Result<BackendInfo, BackendError> {
        self.check()?;
        self.inner.info().await
    }

    async fn close(&self) {
        self.inner.close().await
    }
}
