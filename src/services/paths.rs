//! Storage path service.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::{stamp_created, stamp_updated};
use crate::cache::{cached_result, CacheManager};
use crate::store::{document_id, Document, DocumentStore, StoreError};

const COLLECTION: &str = "paths";
const TTL: Duration = Duration::from_secs(15 * 60);
const MAX_PATHS: usize = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathQuery {
    pub active: Option<bool>,
}

#[derive(Clone)]
pub struct PathService {
    store: Arc<dyn DocumentStore>,
    cache: CacheManager,
}

impl PathService {
    pub fn new(store: Arc<dyn DocumentStore>, cache: CacheManager) -> Self {
        Self { store, cache }
    }

    pub async fn list(&self, query: &PathQuery) -> Result<Vec<Document>, StoreError> {
        let active = query.active.map(|a| a.to_string());
        let key = CacheManager::path_list_cache_key([("active", active.as_deref())]);

        let mut filter = Document::new();
        if let Some(active) = query.active {
            filter.insert("active".to_string(), Value::Bool(active));
        }

        cached_result(self.cache.cache(), &key, Some(TTL), || {
            self.store.find_many(COLLECTION, &filter, 0, MAX_PATHS)
        })
        .await
    }

    /// The first path marked active.
    pub async fn active(&self) -> Result<Document, StoreError> {
        self.list(&PathQuery { active: Some(true) })
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| not_found("active"))
    }

    pub async fn get(&self, id: &str) -> Result<Document, StoreError> {
        let key = CacheManager::path_cache_key(id);
        cached_result(self.cache.cache(), &key, Some(TTL), || async move {
            self.store
                .find_one(COLLECTION, id)
                .await?
                .ok_or_else(|| not_found(id))
        })
        .await
    }

    pub async fn create(&self, mut document: Document) -> Result<Document, StoreError> {
        stamp_created(&mut document);
        let created = self.store.insert_one(COLLECTION, document).await?;
        if let Some(id) = document_id(&created) {
            self.cache.invalidate_path_cache(id).await;
        }
        tracing::info!(path_id = ?document_id(&created), "Path created");
        Ok(created)
    }

    pub async fn update(&self, id: &str, mut changes: Document) -> Result<Document, StoreError> {
        stamp_updated(&mut changes);
        let updated = self
            .store
            .update_one(COLLECTION, id, changes)
            .await?
            .ok_or_else(|| not_found(id))?;
        self.cache.invalidate_path_cache(id).await;
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        if !self.store.delete_one(COLLECTION, id).await? {
            return Err(not_found(id));
        }
        self.cache.invalidate_path_cache(id).await;
        tracing::info!(path_id = id, "Path deleted");
        Ok(())
    }
}

fn not_found(id: &str) -> StoreError {
    StoreError::NotFound {
        collection: COLLECTION.to_string(),
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, MemoryBackend};
    use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};
    use crate::store::MemoryDocumentStore;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn service() -> (PathService, Arc<Cache>) {
        let store = Arc::new(MemoryDocumentStore::with_collections(["paths"]));
        let cache = Arc::new(Cache::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(CircuitBreaker::new("redis-cache", CircuitBreakerConfig::default())),
            Duration::from_secs(60),
        ));
        (PathService::new(store, CacheManager::new(cache.clone())), cache)
    }

    #[tokio::test]
    async fn test_listing_uses_all_key_and_is_invalidated() {
        let (service, cache) = service();
        assert!(service.list(&PathQuery::default()).await.unwrap().is_empty());
        assert!(cache.exists("paths:all").await.unwrap());

        service
            .create(doc(json!({"path": "/data/a", "active": true})))
            .await
            .unwrap();
        assert!(!cache.exists("paths:all").await.unwrap());
        assert_eq!(service.list(&PathQuery::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_active_path() {
        let (service, _cache) = service();
        assert!(matches!(service.active().await, Err(StoreError::NotFound { .. })));

        service.create(doc(json!({"path": "/old", "active": false}))).await.unwrap();
        service.create(doc(json!({"path": "/new", "active": true}))).await.unwrap();
        assert_eq!(service.active().await.unwrap()["path"], "/new");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (service, _cache) = service();
        let created = service.create(doc(json!({"path": "/a"}))).await.unwrap();
        let id = document_id(&created).unwrap().to_string();

        assert_eq!(service.get(&id).await.unwrap()["path"], "/a");
        service.update(&id, doc(json!({"path": "/b"}))).await.unwrap();
        assert_eq!(service.get(&id).await.unwrap()["path"], "/b");

        service.delete(&id).await.unwrap();
        assert!(matches!(service.get(&id).await, Err(StoreError::NotFound { .. })));
    }
}
