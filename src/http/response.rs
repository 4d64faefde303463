//! Response shapes shared by every handler.
//!
//! # Responsibilities
//! - Wrap successful payloads in the `{status, data, message}` envelope
//! - Map handler errors to HTTP status codes with a `{status, message}` body
//! - Build Cache-Control header sets for handlers that set caching policy
//!
//! # Design Decisions
//! - Cache failures surface as 503, never as 500
//! - Error bodies never include backend details beyond the error message

use axum::http::header::{CACHE_CONTROL, ETAG, EXPIRES, PRAGMA};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::cache::CacheError;
use crate::store::StoreError;

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        tracing::error!(error = %err, "Cache operation failed");
        ApiError::Unavailable("Cache service unavailable".to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::Backend(_) => {
                tracing::error!(error = %err, "Datastore operation failed");
                ApiError::Unavailable("Datastore unavailable".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "status": "error", "message": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

/// `{"status": "success", "data": ..., "message": ...}`
pub fn success<T: Serialize>(data: T, message: impl Into<String>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": data,
        "message": message.into(),
    }))
}

/// Header sets for common caching policies.
pub struct CacheControl;

impl CacheControl {
    pub fn no_cache() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        );
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(EXPIRES, HeaderValue::from_static("0"));
        headers
    }

    pub fn max_age(seconds: u64) -> HeaderMap {
        Self::cache_control(format!("public, max-age={}", seconds))
    }

    pub fn private_cache(seconds: u64) -> HeaderMap {
        Self::cache_control(format!("private, max-age={}", seconds))
    }

    /// Quoted ETag plus `must-revalidate`. A value that is not a valid
    /// header yields only the Cache-Control directive.
    pub fn etag(value: &str) -> HeaderMap {
        let mut headers = Self::cache_control("must-revalidate".to_string());
        if let Ok(tag) = HeaderValue::from_str(&format!("\"{}\"", value)) {
            headers.insert(ETAG, tag);
        }
        headers
    }

    fn cache_control(value: String) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(CACHE_CONTROL, value);
        }
        headers
    }
}
