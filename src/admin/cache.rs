//! Cache management endpoints.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::http::response::{success, ApiError, CacheControl};
use crate::http::server::AppState;

const PROBE_KEY: &str = "health_check";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/cache/stats", get(get_cache_stats))
        .route("/api/v1/cache/health", get(check_cache_health))
        .route("/api/v1/cache/clear", delete(clear_cache))
        .route("/api/v1/cache/user/{user_id}", delete(clear_user_cache))
        .route("/api/v1/cache/file/{file_id}", delete(clear_file_cache))
        .route("/api/v1/cache/key/{*key}", get(get_cache_key))
}

/// Hit rate in percent, rounded to two decimals. Zero with no traffic.
pub fn hit_rate_percentage(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        return 0.0;
    }
    (hits as f64 / total as f64 * 10_000.0).round() / 100.0
}

async fn get_cache_stats(State(state): State<AppState>) -> Result<(HeaderMap, Json<Value>), ApiError> {
    let stats = state.cache.get_stats().await?;
    let total = stats.keyspace_hits + stats.keyspace_misses;

    let mut data = serde_json::to_value(&stats).map_err(|e| ApiError::Internal(e.to_string()))?;
    if let Value::Object(map) = &mut data {
        map.insert(
            "hit_rate_percentage".to_string(),
            json!(hit_rate_percentage(stats.keyspace_hits, stats.keyspace_misses)),
        );
        map.insert("total_cache_requests".to_string(), json!(total));
        map.insert("backend".to_string(), json!(state.cache.backend_kind()));
        map.insert("circuit_breaker".to_string(), json!(state.cache.breaker().stats()));
    }

    Ok((
        CacheControl::no_cache(),
        success(data, "Cache statistics retrieved successfully"),
    ))
}

async fn check_cache_health(State(state): State<AppState>) -> Response {
    let probe = json!({ "timestamp": "test", "status": "ok" });
    let outcome = async {
        state
            .cache
            .set(PROBE_KEY, &probe, Some(std::time::Duration::from_secs(10)))
            .await?;
        let value: Option<Value> = state.cache.get(PROBE_KEY).await?;
        state.cache.delete(PROBE_KEY).await?;
        Ok::<_, crate::cache::CacheError>(value.is_some())
    }
    .await;

    let (status, body) = match outcome {
        Ok(true) => (
            StatusCode::OK,
            json!({ "status": "healthy", "service": "redis_cache", "message": "Cache is responsive" }),
        ),
        Ok(false) => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "status": "unhealthy", "service": "redis_cache", "message": "Cache is not responding" }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Cache health probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "status": "unhealthy", "service": "redis_cache", "message": "Cache service unavailable" }),
            )
        }
    };
    (status, CacheControl::no_cache(), Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
struct ClearQuery {
    pattern: Option<String>,
}

async fn clear_cache(
    State(state): State<AppState>,
    Query(query): Query<ClearQuery>,
) -> Result<Json<Value>, ApiError> {
    let pattern = query.pattern.unwrap_or_else(|| "*".to_string());
    if pattern == "*" && !state.config.admin.debug {
        return Err(ApiError::Forbidden(
            "Clearing all cache is not allowed in production".to_string(),
        ));
    }

    let cleared = state.cache.clear_pattern(&pattern).await?;
    tracing::info!(pattern = %pattern, cleared_keys = cleared, "Cache cleared via API");

    let message = format!(
        "Cleared {} cache entries matching pattern '{}'",
        cleared, pattern
    );
    Ok(success(json!({ "pattern": pattern, "cleared_keys": cleared }), message))
}

async fn clear_user_cache(State(state): State<AppState>, Path(user_id): Path<String>) -> Json<Value> {
    state.cache_manager.invalidate_user_cache(&user_id).await;
    tracing::info!(user_id = %user_id, "User cache cleared via API");
    let message = format!("User cache cleared for user {}", user_id);
    success(json!({ "user_id": user_id }), message)
}

async fn clear_file_cache(State(state): State<AppState>, Path(file_id): Path<String>) -> Json<Value> {
    state.cache_manager.invalidate_file_cache(&file_id).await;
    tracing::info!(file_id = %file_id, "File cache cleared via API");
    let message = format!("File cache cleared for file {}", file_id);
    success(json!({ "file_id": file_id }), message)
}

async fn get_cache_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<(HeaderMap, Json<Value>), ApiError> {
    if !state.config.admin.debug {
        return Err(ApiError::Forbidden(
            "Cache key access is only allowed in debug mode".to_string(),
        ));
    }

    let value: Option<Value> = state.cache.get(&key).await?;
    let exists = value.is_some();
    Ok((
        CacheControl::no_cache(),
        success(
            json!({ "key": key, "value": value, "exists": exists }),
            "Cache key retrieved successfully",
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use axum::body::Body;
    use axum::extract::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state(debug: bool) -> AppState {
        let mut config = ServiceConfig::default();
        config.admin.debug = debug;
        AppState::in_memory(config)
    }

    async fn call(state: &AppState, method: &str, uri: &str) -> (StatusCode, Value) {
        let app = routes().with_state(state.clone());
        let response = app
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_hit_rate() {
        assert_eq!(hit_rate_percentage(0, 0), 0.0);
        assert_eq!(hit_rate_percentage(1, 2), 33.33);
        assert_eq!(hit_rate_percentage(3, 1), 75.0);
    }

    #[tokio::test]
    async fn test_stats_and_outage() {
        let state = state(false);
        state.cache.set("a", &1, None).await.unwrap();
        let _: Option<u32> = state.cache.get("a").await.unwrap();
        let _: Option<u32> = state.cache.get("b").await.unwrap();

        let (status, body) = call(&state, "GET", "/api/v1/cache/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["hit_rate_percentage"], 50.0);
        assert_eq!(body["data"]["total_cache_requests"], 2);

        state.cache.breaker().force_open();
        let (status, body) = call(&state, "GET", "/api/v1/cache/stats").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["message"], "Cache service unavailable");

        let (status, body) = call(&state, "GET", "/api/v1/cache/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
    }

    #[tokio::test]
    async fn test_cache_health_round_trip() {
        let (status, body) = call(&state(false), "GET", "/api/v1/cache/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_clear_everything_needs_debug() {
        let (status, _) = call(&state(false), "DELETE", "/api/v1/cache/clear").await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let state = state(true);
        for key in ["files:1", "files:2", "path:1"] {
            state.cache.set(key, &1, Some(Duration::from_secs(60))).await.unwrap();
        }
        let (status, body) = call(&state, "DELETE", "/api/v1/cache/clear?pattern=files:*").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["cleared_keys"], 2);

        let (_, body) = call(&state, "DELETE", "/api/v1/cache/clear").await;
        assert_eq!(body["data"]["cleared_keys"], 1);
    }

    #[tokio::test]
    async fn test_key_inspection_needs_debug() {
        let (status, _) = call(&state(false), "GET", "/api/v1/cache/key/file:1").await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let state = state(true);
        state.cache.set("file:1", &json!({"name": "a"}), None).await.unwrap();
        let (status, body) = call(&state, "GET", "/api/v1/cache/key/file:1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["exists"], true);
        assert_eq!(body["data"]["value"]["name"], "a");
    }

    #[tokio::test]
    async fn test_file_invalidation_endpoint() {
        let state = state(false);
        state.cache.set("file:9", &1, None).await.unwrap();
        state.cache.set("files:all", &1, None).await.unwrap();

        let (status, body) = call(&state, "DELETE", "/api/v1/cache/file/9").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["file_id"], "9");
        assert!(!state.cache.exists("file:9").await.unwrap());
        assert!(!state.cache.exists("files:all").await.unwrap());
    }
}
