//! Read-through helper for service-layer callers.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::client::Cache;

/// Return the cached value for `key`, or compute it with `fetch` and store it.
///
/// Cache failures (backend errors, open circuit, encoding problems) are logged
/// and never returned: the caller always gets either a cached value or
/// `fetch`'s own result. Only `fetch`'s error propagates.
pub async fn cached_result<T, E, F, Fut>(
    cache: &Cache,
    key: &str,
    ttl: Option<Duration>,
    fetch: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match cache.get::<T>(key).await {
        Ok(Some(hit)) => return Ok(hit),
        Ok(None) => {}
        Err(e) => tracing::warn!(key, error = %e, "Cache unavailable, fetching fresh data"),
    }

    let fresh = fetch().await?;

    if let Err(e) = cache.set(key, &fresh, ttl).await {
        tracing::warn!(key, error = %e, "Failed to cache result");
    }
    Ok(fresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fault::FlakyBackend;
    use crate::cache::memory::MemoryBackend;
    use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn cache_over(backend: Arc<dyn crate::cache::CacheBackend>) -> Cache {
        Cache::new(
            backend,
            Arc::new(CircuitBreaker::new("redis-cache", CircuitBreakerConfig::default())),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let cache = cache_over(Arc::new(MemoryBackend::new()));
        let fetches = AtomicU32::new(0);
        let fetch = || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(vec![1, 2, 3])
        };

        let first = cached_result(&cache, "files:all", None, fetch).await.unwrap();
        let second = cached_result(&cache, "files:all", None, fetch).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_open_circuit_still_returns_fresh_value() {
        let cache = cache_over(Arc::new(MemoryBackend::new()));
        cache.breaker().force_open();

        let value = cached_result(&cache, "file:1", None, || async { Ok::<_, String>("fresh".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "fresh");
    }

    #[tokio::test]
    async fn test_unreachable_backend_still_returns_fresh_value() {
        let flaky = Arc::new(FlakyBackend::new(Arc::new(MemoryBackend::new())));
        flaky.set_failing(true);
        let cache = cache_over(flaky);

        for i in 0..5 {
            let value = cached_result(&cache, "file:1", None, || async move { Ok::<_, String>(i) })
                .await
                .unwrap();
            assert_eq!(value, i);
        }
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let cache = cache_over(Arc::new(MemoryBackend::new()));
        let result: Result<u32, String> =
            cached_result(&cache, "file:1", None, || async { Err("not found".to_string()) }).await;
        assert_eq!(result.unwrap_err(), "not found");
    }
}
