//! Write-path cache invalidation.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::{invalidation_patterns, is_mutating};

/// Clears related response cache keys after a successful mutation.
/// Each pattern is attempted even if an earlier one failed.
pub async fn invalidate_cache(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    if !state.config.http_cache.enabled || !is_mutating(&method) || !response.status().is_success() {
        return response;
    }

    for pattern in invalidation_patterns(&path) {
        match state.cache.clear_pattern(pattern).await {
            Ok(cleared) => {
                metrics::record_invalidation(pattern, cleared);
                tracing::debug!(%method, %path, pattern, cleared_keys = cleared, "Cache invalidated after modification");
            }
            Err(e) => {
                tracing::warn!(%method, %path, pattern, error = %e, "Failed to invalidate cache");
            }
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::Router;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(state: AppState) -> Router {
        Router::new()
            .route(
                "/api/v1/files/",
                get(|| async { "[]" }).post(|| async { StatusCode::CREATED }),
            )
            .route("/api/v1/audit", post(|| async { StatusCode::OK }))
            .route("/api/v1/broken", post(|| async { StatusCode::BAD_REQUEST }))
            .layer(axum::middleware::from_fn_with_state(state.clone(), invalidate_cache))
            .with_state(state)
    }

    async fn seed(state: &AppState) {
        let ttl = Some(Duration::from_secs(60));
        for key in ["http_cache:api/v1/files", "http_cache:api/v1/paths", "http_cache:api/v1/health"] {
            state.cache.set(key, "cached", ttl).await.unwrap();
        }
    }

    async fn send(app: Router, method: &str, uri: &str) -> StatusCode {
        app.oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    async fn present(state: &AppState, key: &str) -> bool {
        state.cache.exists(key).await.unwrap()
    }

    #[tokio::test]
    async fn test_file_mutation_clears_files_and_health() {
        let state = AppState::in_memory(Default::default());
        seed(&state).await;

        assert_eq!(send(app(state.clone()), "POST", "/api/v1/files/").await, StatusCode::CREATED);
        assert!(!present(&state, "http_cache:api/v1/files").await);
        assert!(!present(&state, "http_cache:api/v1/health").await);
        assert!(present(&state, "http_cache:api/v1/paths").await);
    }

    #[tokio::test]
    async fn test_unknown_resource_clears_everything() {
        let state = AppState::in_memory(Default::default());
        seed(&state).await;

        send(app(state.clone()), "POST", "/api/v1/audit").await;
        assert!(!present(&state, "http_cache:api/v1/paths").await);
        assert!(!present(&state, "http_cache:api/v1/files").await);
    }

    #[tokio::test]
    async fn test_failed_or_safe_requests_keep_cache() {
        let state = AppState::in_memory(Default::default());
        seed(&state).await;

        send(app(state.clone()), "POST", "/api/v1/broken").await;
        send(app(state.clone()), "GET", "/api/v1/files/").await;
        assert!(present(&state, "http_cache:api/v1/files").await);
        assert!(present(&state, "http_cache:api/v1/paths").await);
    }

    #[tokio::test]
    async fn test_cache_outage_does_not_fail_mutation() {
        let state = AppState::in_memory(Default::default());
        state.cache.breaker().force_open();
        assert_eq!(send(app(state.clone()), "POST", "/api/v1/files/").await, StatusCode::CREATED);
    }
}
