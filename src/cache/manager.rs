//! Cache key naming and targeted invalidation.
//!
//! Keys are colon-joined segments with a lowercase namespace first:
//! `file:<id>`, `path:<id>`, `user_files:<user>:<page>`,
//! `files:<k=v:...>` or `files:all`, and the `paths` equivalents.
//!
//! Invalidation is deliberately broad: any single file mutation clears every
//! cached file listing. Helpers here never fail; errors are logged.

use std::fmt::Display;
use std::sync::Arc;

use super::client::Cache;

/// Join key segments with `:`.
pub fn cache_key<I>(parts: I) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    parts
        .into_iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(":")
}

/// Deterministic listing key: filters are sorted by name and unset ones dropped,
/// so differently-ordered but equal filter sets share a key.
fn list_cache_key<'a, I>(namespace: &str, filters: I) -> String
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    let mut pairs: Vec<(&str, &str)> = filters
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect();
    pairs.sort_unstable();

    if pairs.is_empty() {
        return cache_key([namespace, "all"]);
    }
    let filter = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(":");
    cache_key([namespace, filter.as_str()])
}

/// Key scheme and invalidation policy on top of a shared [`Cache`].
#[derive(Debug, Clone)]
pub struct CacheManager {
    cache: Arc<Cache>,
}

impl CacheManager {
    pub fn new(cache: Arc<Cache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn file_cache_key(file_id: &str) -> String {
        cache_key(["file", file_id])
    }

    pub fn path_cache_key(path_id: &str) -> String {
        cache_key(["path", path_id])
    }

    pub fn user_files_cache_key(user_id: &str, page: u32) -> String {
        cache_key(["user_files".to_string(), user_id.to_string(), page.to_string()])
    }

    pub fn file_list_cache_key<'a, I>(filters: I) -> String
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        list_cache_key("files", filters)
    }

    pub fn path_list_cache_key<'a, I>(filters: I) -> String
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        list_cache_key("paths", filters)
    }

    /// Clear every cached page of a user's files.
    pub async fn invalidate_user_cache(&self, user_id: &str) {
        let pattern = cache_key(["user_files", user_id, "*"]);
        match self.cache.clear_pattern(&pattern).await {
            Ok(_) => tracing::debug!(user_id, "User cache invalidated"),
            Err(e) => tracing::warn!(user_id, error = %e, "Failed to invalidate user cache"),
        }
    }

    /// Drop one file entry and every cached file listing.
    pub async fn invalidate_file_cache(&self, file_id: &str) {
        self.invalidate_entity("files", &Self::file_cache_key(file_id), file_id)
            .await
    }

    /// Drop one path entry and every cached path listing.
    pub async fn invalidate_path_cache(&self, path_id: &str) {
        self.invalidate_entity("paths", &Self::path_cache_key(path_id), path_id)
            .await
    }

    async fn invalidate_entity(&self, namespace: &str, key: &str, id: &str) {
        let result = async {
            self.cache.delete(key).await?;
            self.cache.clear_pattern(&cache_key([namespace, "*"])).await
        }
        .await;

        match result {
            Ok(cleared) => tracing::debug!(namespace, id, listings_cleared = cleared, "Entity cache invalidated"),
            Err(e) => tracing::warn!(namespace, id, error = %e, "Failed to invalidate entity cache"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryBackend;
    use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};
    use std::time::Duration;

    fn manager() -> CacheManager {
        let cache = Cache::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(CircuitBreaker::new("redis-cache", CircuitBreakerConfig::default())),
            Duration::from_secs(60),
        );
        CacheManager::new(Arc::new(cache))
    }

    #[test]
    fn test_key_formats() {
        assert_eq!(cache_key(["a", "b", "c"]), "a:b:c");
        assert_eq!(CacheManager::file_cache_key("42"), "file:42");
        assert_eq!(CacheManager::path_cache_key("7"), "path:7");
        assert_eq!(CacheManager::user_files_cache_key("u1", 2), "user_files:u1:2");
    }

    #[test]
    fn test_list_keys_are_order_independent() {
        let a = CacheManager::file_list_cache_key([("user", Some("u1")), ("kind", Some("pdf"))]);
        let b = CacheManager::file_list_cache_key([("kind", Some("pdf")), ("user", Some("u1"))]);
        assert_eq!(a, b);
        assert_eq!(a, "files:kind=pdf:user=u1");

        let unset = CacheManager::file_list_cache_key([("kind", None), ("user", Some("u1"))]);
        assert_eq!(unset, "files:user=u1");

        assert_eq!(CacheManager::path_list_cache_key([("kind", None)]), "paths:all");
    }

    #[tokio::test]
    async fn test_invalidate_file_clears_entry_and_listings() {
        let manager = manager();
        let cache = manager.cache();
        cache.set("file:1", &"one", None).await.unwrap();
        cache.set("file:2", &"two", None).await.unwrap();
        cache.set("files:all", &["one", "two"], None).await.unwrap();
        cache.set("files:user=u1", &["one"], None).await.unwrap();

        manager.invalidate_file_cache("1").await;

        assert!(!cache.exists("file:1").await.unwrap());
        assert!(cache.exists("file:2").await.unwrap());
        assert!(!cache.exists("files:all").await.unwrap());
        assert!(!cache.exists("files:user=u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_user_cache() {
        let manager = manager();
        let cache = manager.cache();
        cache.set("user_files:u1:1", &1, None).await.unwrap();
        cache.set("user_files:u1:2", &2, None).await.unwrap();
        cache.set("user_files:u2:1", &3, None).await.unwrap();

        manager.invalidate_user_cache("u1").await;

        assert!(!cache.exists("user_files:u1:1").await.unwrap());
        assert!(!cache.exists("user_files:u1:2").await.unwrap());
        assert!(cache.exists("user_files:u2:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalidation_swallows_open_circuit() {
        let manager = manager();
        manager.cache().breaker().force_open();
        manager.invalidate_path_cache("9").await;
        manager.invalidate_user_cache("u1").await;
    }
}
