//! Document services behind the cached API.
//!
//! # Data Flow
//! ```text
//! routes.rs handler
//!     → FileService / PathService
//!     → cached_result(key from CacheManager, fetch from DocumentStore)
//!
//! Mutation
//!     → DocumentStore write
//!     → CacheManager invalidation (entity key + listing namespace)
//! ```
//!
//! # Design Decisions
//! - Reads degrade to the datastore when the cache is unavailable
//! - Only datastore errors reach the caller
//! - Timestamps are stamped here, not by the store

pub mod files;
pub mod paths;
pub mod routes;

use serde_json::Value;

use crate::store::Document;

pub use files::{FileQuery, FileService};
pub use paths::{PathQuery, PathService};

fn now_rfc3339() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339())
}

fn stamp_created(document: &mut Document) {
    let now = now_rfc3339();
    document.insert("created_at".to_string(), now.clone());
    document.insert("updated_at".to_string(), now);
}

fn stamp_updated(document: &mut Document) {
    document.insert("updated_at".to_string(), now_rfc3339());
}
