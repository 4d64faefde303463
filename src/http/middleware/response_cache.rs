//! Read-through HTTP response cache.
//!
//! # Responsibilities
//! - Derive a deterministic key from path, sorted query and allow-listed headers
//! - Replay stored responses with `x-cache: HIT`
//! - Record cacheable 2xx responses under a TTL chosen by key category
//!
//! # Design Decisions
//! - Only allow-listed headers enter the key; credentials and cookies never do
//! - Responses marked no-cache, no-store or private (Cache-Control or Expires)
//!   are passed through unstored
//! - Per-request headers (request id, length, date, cookies) are not replayed
//! - Bodies that may exceed `max_response_bytes`, or whose size is unknown,
//!   pass through unbuffered and unstored

use std::collections::BTreeMap;
use std::time::Duration;

use axum::body::{Body, HttpBody};
use axum::extract::{Request, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES};
use axum::http::response::Parts;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::cache::cache_key;
use crate::config::HttpCacheConfig;
use crate::health::check::round2;
use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::{ttl_for_key, HTTP_CACHE_NAMESPACE};

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const X_CACHED_AT: HeaderName = HeaderName::from_static("x-cached-at");
pub const X_ORIGINAL_PROCESSING_TIME: HeaderName =
    HeaderName::from_static("x-original-processing-time");

const UNCACHEABLE_DIRECTIVES: [&str; 3] = ["no-cache", "no-store", "private"];

const NOT_REPLAYED: [&str; 6] = [
    "content-length",
    "transfer-encoding",
    "connection",
    "date",
    "set-cookie",
    "x-request-id",
];

/// A stored response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub content_type: String,
    /// Unix seconds.
    pub cached_at: i64,
    /// Handler time on the original miss, in seconds.
    pub processing_time: f64,
}

impl CachedResponse {
    fn capture(parts: &Parts, body: &[u8], processing_time: Duration) -> Self {
        let cached_at = Utc::now().timestamp();
        let mut headers: BTreeMap<String, String> = parts
            .headers
            .iter()
            .filter(|(name, _)| !NOT_REPLAYED.contains(&name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        headers.insert(X_CACHE.as_str().to_string(), "HIT".to_string());
        headers.insert(X_CACHED_AT.as_str().to_string(), cached_at.to_string());
        headers.insert(
            X_ORIGINAL_PROCESSING_TIME.as_str().to_string(),
            round2(processing_time.as_secs_f64() * 1000.0).to_string(),
        );

        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_string();

        Self {
            status_code: parts.status.as_u16(),
            headers,
            body: String::from_utf8_lossy(body).into_owned(),
            content_type,
            cached_at,
            processing_time: processing_time.as_secs_f64(),
        }
    }
}

impl IntoResponse for CachedResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        let mut response = (status, self.body).into_response();
        let headers = response.headers_mut();

        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::debug!(header = %name, "Skipping unreplayable cached header"),
            }
        }
        if !self.headers.contains_key(CONTENT_TYPE.as_str()) {
            if let Ok(value) = HeaderValue::from_str(&self.content_type) {
                headers.insert(CONTENT_TYPE, value);
            }
        }
        headers.insert(X_CACHE, HeaderValue::from_static("HIT"));
        response
    }
}

/// `http_cache:<path>[:<sorted query>][:<sorted name:value headers>]`
pub fn response_cache_key(request: &Request, config: &HttpCacheConfig) -> String {
    let mut parts = vec![
        HTTP_CACHE_NAMESPACE.to_string(),
        request.uri().path().trim_matches('/').to_string(),
    ];

    if config.cache_query_params {
        if let Some(query) = request.uri().query() {
            let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
            pairs.sort_unstable();
            if !pairs.is_empty() {
                parts.push(pairs.join("&"));
            }
        }
    }

    let mut headers: Vec<String> = config
        .key_headers
        .iter()
        .map(|name| name.to_ascii_lowercase())
        .filter_map(|name| {
            let value = request.headers().get(name.as_str())?.to_str().ok()?;
            Some(format!("{}:{}", name, value))
        })
        .collect();
    headers.sort_unstable();
    if !headers.is_empty() {
        parts.push(headers.join(":"));
    }

    cache_key(parts)
}

fn is_storable(response: &Response) -> bool {
    if !response.status().is_success() {
        return false;
    }
    [CACHE_CONTROL, EXPIRES].iter().all(|name| {
        let value = response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        !UNCACHEABLE_DIRECTIVES.iter().any(|d| value.contains(d))
    })
}

/// Response cache stage. Never fails a request because of the cache.
pub async fn response_cache(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let config = &state.config.http_cache;
    if !config.enabled
        || !state
            .cacheable_routes
            .is_cacheable(request.method(), request.uri().path())
    {
        return next.run(request).await;
    }

    let key = response_cache_key(&request, config);
    let id = request_id(&request).to_string();

    match state.cache.get::<CachedResponse>(&key).await {
        Ok(Some(cached)) => {
            metrics::record_http_cache("hit");
            tracing::debug!(request_id = %id, cache_key = %key, "Response cache hit");
            return cached.into_response();
        }
        Ok(None) => metrics::record_http_cache("miss"),
        Err(e) => {
            metrics::record_http_cache("miss");
            tracing::warn!(request_id = %id, cache_key = %key, error = %e, "Response cache lookup failed");
        }
    }

    let started = Instant::now();
    let response = next.run(request).await;
    let processing_time = started.elapsed();

    if !is_storable(&response) {
        metrics::record_http_cache("skip");
        return response;
    }

    let limit = config.max_response_bytes;
    let fits = response
        .body()
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= limit as u64);
    if !fits {
        metrics::record_http_cache("skip");
        tracing::debug!(request_id = %id, cache_key = %key, limit, "Response too large to cache");
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(request_id = %id, error = %e, "Failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let envelope = CachedResponse::capture(&parts, &bytes, processing_time);
    let ttl = ttl_for_key(&key, Duration::from_secs(config.default_ttl_secs));
    match state.cache.set(&key, &envelope, Some(ttl)).await {
        Ok(_) => {
            metrics::record_http_cache("store");
            tracing::debug!(
                request_id = %id,
                cache_key = %key,
                status_code = envelope.status_code,
                processing_time_ms = round2(processing_time.as_secs_f64() * 1000.0),
                "Response cached"
            );
        }
        Err(e) => {
            tracing::warn!(request_id = %id, cache_key = %key, error = %e, "Failed to cache response")
        }
    }

    parts.headers.insert(X_CACHE, HeaderValue::from_static("MISS"));
    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn get_request(uri: &str) -> Request {
        Request::builder()
            .uri(uri)
            .header("accept", "application/json")
            .header("authorization", "Bearer secret")
            .body(Body::empty())
            .unwrap()
    }

    fn counting_app(state: AppState, hits: Arc<AtomicUsize>, headers: &'static [(&'static str, &'static str)]) -> Router {
        Router::new()
            .route(
                "/api/v1/files/",
                get(move || {
                    let hits = hits.clone();
                    async move {
                        let n = hits.fetch_add(1, Ordering::SeqCst);
                        let mut response = format!("{{\"n\":{}}}", n).into_response();
                        for (name, value) in headers {
                            response
                                .headers_mut()
                                .insert(*name, HeaderValue::from_static(*value));
                        }
                        response
                    }
                }),
            )
            .layer(axum::middleware::from_fn_with_state(state.clone(), response_cache))
            .with_state(state)
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_key_is_order_independent_and_excludes_credentials() {
        let config = HttpCacheConfig::default();
        let a = Request::builder()
            .uri("/api/v1/files/?b=2&a=1")
            .header("accept", "application/json")
            .header("authorization", "Bearer one")
            .body(Body::empty())
            .unwrap();
        let b = Request::builder()
            .uri("/api/v1/files?a=1&b=2")
            .header("accept", "application/json")
            .header("authorization", "Bearer two")
            .header("cookie", "session=x")
            .body(Body::empty())
            .unwrap();

        let key = response_cache_key(&a, &config);
        assert_eq!(key, "http_cache:api/v1/files:a=1&b=2:accept:application/json");
        assert_eq!(key, response_cache_key(&b, &config));
    }

    #[test]
    fn test_query_can_be_left_out_of_key() {
        let config = HttpCacheConfig {
            cache_query_params: false,
            ..HttpCacheConfig::default()
        };
        let request = Request::builder()
            .uri("/api/v1/paths/?active=true")
            .body(Body::empty())
            .unwrap();
        assert_eq!(response_cache_key(&request, &config), "http_cache:api/v1/paths");
    }

    #[tokio::test]
    async fn test_second_get_is_replayed() {
        let state = AppState::in_memory(Default::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let app = counting_app(state, hits.clone(), &[("content-type", "application/json")]);

        let first = app.clone().oneshot(get_request("/api/v1/files/")).await.unwrap();
        assert_eq!(first.headers()[X_CACHE], "MISS");
        let first_body = body_text(first).await;

        let second = app.oneshot(get_request("/api/v1/files/")).await.unwrap();
        assert_eq!(second.headers()[X_CACHE], "HIT");
        assert_eq!(second.headers()[CONTENT_TYPE], "application/json");
        assert!(second.headers().contains_key(X_CACHED_AT));
        assert!(second.headers().contains_key(X_ORIGINAL_PROCESSING_TIME));
        assert_eq!(body_text(second).await, first_body);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_store_response_is_not_cached() {
        let state = AppState::in_memory(Default::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let app = counting_app(state, hits.clone(), &[("cache-control", "private, max-age=10")]);

        for _ in 0..2 {
            let response = app.clone().oneshot(get_request("/api/v1/files/")).await.unwrap();
            assert!(!response.headers().contains_key(X_CACHE));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_oversized_response_passes_through_uncached() {
        let mut config = crate::config::ServiceConfig::default();
        config.server.max_body_size = 1024;
        config.http_cache.max_response_bytes = 1024;
        let state = AppState::in_memory(config);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new()
            .route(
                "/api/v1/files/",
                get(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { "x".repeat(4096) }
                }),
            )
            .layer(axum::middleware::from_fn_with_state(state.clone(), response_cache))
            .with_state(state);

        for _ in 0..2 {
            let response = app.clone().oneshot(get_request("/api/v1/files/")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(!response.headers().contains_key(X_CACHE));
            assert_eq!(body_text(response).await.len(), 4096);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_outage_is_fail_open() {
        let state = AppState::in_memory(Default::default());
        state.cache.breaker().force_open();
        let hits = Arc::new(AtomicUsize::new(0));
        let app = counting_app(state, hits.clone(), &[]);

        for _ in 0..2 {
            let response = app.clone().oneshot(get_request("/api/v1/files/")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
