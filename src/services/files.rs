//! File metadata service.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::{stamp_created, stamp_updated};
use crate::cache::{cached_result, CacheManager};
use crate::store::{document_id, Document, DocumentStore, StoreError};

const COLLECTION: &str = "files";
const ITEM_TTL: Duration = Duration::from_secs(10 * 60);
const LIST_TTL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// Listing filters and pagination.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileQuery {
    pub owner: Option<String>,
    pub status: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl FileQuery {
    /// 1-based.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    fn filter(&self) -> Document {
        let mut filter = Document::new();
        if let Some(owner) = &self.owner {
            filter.insert("owner".to_string(), Value::String(owner.clone()));
        }
        if let Some(status) = &self.status {
            filter.insert("status".to_string(), Value::String(status.clone()));
        }
        filter
    }

    fn skip(&self) -> usize {
        ((self.page() - 1) as usize) * self.page_size() as usize
    }
}

#[derive(Clone)]
pub struct FileService {
    store: Arc<dyn DocumentStore>,
    cache: CacheManager,
}

impl FileService {
    pub fn new(store: Arc<dyn DocumentStore>, cache: CacheManager) -> Self {
        Self { store, cache }
    }

    pub async fn list(&self, query: &FileQuery) -> Result<Vec<Document>, StoreError> {
        let page = query.page().to_string();
        let page_size = query.page_size().to_string();
        let key = CacheManager::file_list_cache_key([
            ("owner", query.owner.as_deref()),
            ("status", query.status.as_deref()),
            ("page", Some(page.as_str())),
            ("page_size", Some(page_size.as_str())),
        ]);
        let filter = query.filter();

        cached_result(self.cache.cache(), &key, Some(LIST_TTL), || {
            self.store
                .find_many(COLLECTION, &filter, query.skip(), query.page_size() as usize)
        })
        .await
    }

    /// One page of a user's files, cached per user so user invalidation can
    /// drop every page at once.
    pub async fn list_for_user(&self, user_id: &str, page: u32) -> Result<Vec<Document>, StoreError> {
        let query = FileQuery {
            owner: Some(user_id.to_string()),
            page: Some(page),
            ..FileQuery::default()
        };
        let key = CacheManager::user_files_cache_key(user_id, query.page());
        let filter = query.filter();

        cached_result(self.cache.cache(), &key, Some(LIST_TTL), || {
            self.store
                .find_many(COLLECTION, &filter, query.skip(), query.page_size() as usize)
        })
        .await
    }

    pub async fn get(&self, id: &str) -> Result<Document, StoreError> {
        let key = CacheManager::file_cache_key(id);
        cached_result(self.cache.cache(), &key, Some(ITEM_TTL), || async move {
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
            self.invalidate(id, &created).await;
        }
        tracing::info!(file_id = ?document_id(&created), "File created");
        Ok(created)
    }

    pub async fn update(&self, id: &str, mut changes: Document) -> Result<Document, StoreError> {
        stamp_updated(&mut changes);
        let updated = self
            .store
            .update_one(COLLECTION, id, changes)
            .await?
            .ok_or_else(|| not_found(id))?;
        self.invalidate(id, &updated).await;
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let existing = self.store.find_one(COLLECTION, id).await?;
        if !self.store.delete_one(COLLECTION, id).await? {
            return Err(not_found(id));
        }
        match existing {
            Some(document) => self.invalidate(id, &document).await,
            None => self.cache.invalidate_file_cache(id).await,
        }
        tracing::info!(file_id = id, "File deleted");
        Ok(())
    }

    async fn invalidate(&self, id: &str, document: &Document) {
        self.cache.invalidate_file_cache(id).await;
        if let Some(owner) = document.get("owner").and_then(Value::as_str) {
            self.cache.invalidate_user_cache(owner).await;
        }
    }
}

fn not_found(id: &str) -> StoreError {
    StoreError::NotFound {
        collection: COLLECTION.to_string(),
        id: id.to_string(),
    }
}
