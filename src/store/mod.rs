//! Document datastore boundary.
//!
//! # Responsibilities
//! - Define the async operations services and health checks need from the
//!   primary datastore
//! - Provide an in-process implementation for tests and single-node runs
//!
//! # Design Decisions
//! - Documents are JSON objects; the store owns the `id` field
//! - The schema of stored documents is the services' concern, not the store's

pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use memory::MemoryDocumentStore;

/// A stored document: a JSON object carrying a string `id`.
pub type Document = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("document '{id}' not found in '{collection}'")]
    NotFound { collection: String, id: String },

    #[error("datastore error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;

    async fn find_one(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Documents whose fields equal every entry of `filter`, in insertion order.
    async fn find_many(
        &self,
        collection: &str,
        filter: &Document,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError>;

    /// Insert `document`, assigning a fresh `id`. Returns the stored document.
    async fn insert_one(&self, collection: &str, document: Document) -> Result<Document, StoreError>;

    /// Merge `changes` into the document. `None` if it does not exist.
    async fn update_one(
        &self,
        collection: &str,
        id: &str,
        changes: Document,
    ) -> Result<Option<Document>, StoreError>;

    /// Returns whether a document was removed.
    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool, StoreError>;
}

/// Read the `id` field of a stored document.
pub fn document_id(document: &Document) -> Option<&str> {
    document.get("id").and_then(Value::as_str)
}
