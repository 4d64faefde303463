//! In-process document store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{document_id, Document, DocumentStore, StoreError};

/// Collections of documents kept in insertion order behind one lock.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<BTreeMap<String, Vec<Document>>>,
    unavailable: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with the given (empty) collections already created.
    pub fn with_collections<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let collections = names.into_iter().map(|n| (n.into(), Vec::new())).collect();
        Self {
            collections: RwLock::new(collections),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate an outage: every operation fails while set.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Backend("datastore unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(field, expected)| document.get(field) == Some(expected))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        self.check()?;
        Ok(self.collections.read().await.keys().cloned().collect())
    }

    async fn find_one(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.check()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| document_id(d) == Some(id)))
            .cloned())
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Document,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        self.check()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| matches(d, filter))
                    .skip(skip)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert_one(&self, collection: &str, mut document: Document) -> Result<Document, StoreError> {
        self.check()?;
        document.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());
        Ok(document)
    }

    async fn update_one(
        &self,
        collection: &str,
        id: &str,
        changes: Document,
    ) -> Result<Option<Document>, StoreError> {
        self.check()?;
        let mut collections = self.collections.write().await;
        let Some(document) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| document_id(d) == Some(id)))
        else {
            return Ok(None);
        };

        for (field, value) in changes {
            if field != "id" {
                document.insert(field, value);
            }
        }
        Ok(Some(document.clone()))
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.check()?;
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| document_id(d) != Some(id));
        Ok(docs.len() < before)
    }
}
