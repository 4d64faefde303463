//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble the shared application state
//! - Create the Axum router with every handler
//! - Wire up middleware (tracing, request id, timeout, body limit, caching)
//! - Bind server to listener and stop on the shutdown signal

use std::future::Future;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use crate::admin::setup_admin_router;
use crate::cache::{Cache, CacheBackend, CacheManager, MemoryBackend};
use crate::config::ServiceConfig;
use crate::health::{
    CacheCheck, CircuitBreakerCheck, DatabaseCheck, FilesystemCheck, HealthCheckManager,
    SystemResourcesCheck,
};
use crate::http::middleware::{invalidate_cache, response_cache};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, trace_layer};
use crate::resilience::CircuitBreakerManager;
use crate::routing::CacheableRoutes;
use crate::services::routes::{file_routes, path_routes};
use crate::services::{FileService, PathService};
use crate::store::{DocumentStore, MemoryDocumentStore};

/// Name of the breaker guarding the cache backend.
pub const CACHE_BREAKER: &str = "redis-cache";

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub cache: Arc<Cache>,
    pub cache_manager: CacheManager,
    pub breakers: Arc<CircuitBreakerManager>,
    pub health: Arc<HealthCheckManager>,
    pub store: Arc<dyn DocumentStore>,
    pub files: FileService,
    pub paths: PathService,
    pub cacheable_routes: Arc<CacheableRoutes>,
}

impl AppState {
    /// Wire breaker registry → cache → services → health checks.
    pub fn new(
        config: ServiceConfig,
        backend: Arc<dyn CacheBackend>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let config = Arc::new(config);
        let breakers = Arc::new(CircuitBreakerManager::new());
        let breaker = breakers.get_or_create(CACHE_BREAKER, config.circuit_breaker.clone());
        let cache = Arc::new(Cache::new(backend, breaker, config.redis.default_ttl()));
        let cache_manager = CacheManager::new(cache.clone());

        let health_config = &config.health;
        let health = HealthCheckManager::new(health_config.cache_window())
            .with_check(Arc::new(DatabaseCheck::new(store.clone(), health_config)))
            .with_check(Arc::new(CacheCheck::new(cache.clone(), health_config)))
            .with_check(Arc::new(FilesystemCheck::new(health_config)))
            .with_check(Arc::new(SystemResourcesCheck::new(health_config)))
            .with_check(Arc::new(CircuitBreakerCheck::new(breakers.clone(), health_config)));

        Self {
            files: FileService::new(store.clone(), cache_manager.clone()),
            paths: PathService::new(store.clone(), cache_manager.clone()),
            cacheable_routes: Arc::new(CacheableRoutes::from_config(&config.http_cache)),
            health: Arc::new(health),
            config,
            cache,
            cache_manager,
            breakers,
            store,
        }
    }

    /// State over the in-process cache and datastore.
    pub fn in_memory(config: ServiceConfig) -> Self {
        let store = MemoryDocumentStore::with_collections(config.health.expected_collections.clone());
        Self::new(config, Arc::new(MemoryBackend::new()), Arc::new(store))
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let server = &state.config.server;
    let request_timeout = server.request_timeout();
    let max_body_size = server.max_body_size;

    Router::new()
        .merge(setup_admin_router())
        .merge(file_routes())
        .merge(path_routes())
        .layer(from_fn_with_state(state.clone(), invalidate_cache))
        .layer(from_fn_with_state(state.clone(), response_cache))
        .layer(DefaultBodyLimit::max(max_body_size))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(trace_layer())
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
}

/// HTTP server for the cache-fronted API.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: build_router(state.clone()),
            state,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            cache_backend = self.state.cache.backend_kind(),
            http_cache_enabled = self.state.config.http_cache.enabled,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_unknown_route_is_404_with_request_id() {
        let app = build_router(AppState::in_memory(ServiceConfig::default()));
        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_breaker_is_registered_once() {
        let state = AppState::in_memory(ServiceConfig::default());
        assert_eq!(state.breakers.len(), 1);
        assert!(state.breakers.get(CACHE_BREAKER).is_some());
        assert_eq!(state.cache.breaker().name(), CACHE_BREAKER);
    }

    #[tokio::test]
    async fn test_mutation_invalidates_cached_listing() {
        let app = build_router(AppState::in_memory(ServiceConfig::default()));
        let get = || {
            Request::builder()
                .uri("/api/v1/files/")
                .header("accept", "application/json")
                .body(Body::empty())
                .unwrap()
        };

        let first = app.clone().oneshot(get()).await.unwrap();
        assert_eq!(first.headers()["x-cache"], "MISS");
        let second = app.clone().oneshot(get()).await.unwrap();
        assert_eq!(second.headers()["x-cache"], "HIT");

        let create = Request::builder()
            .method("POST")
            .uri("/api/v1/files/")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"a.pdf"}"#))
            .unwrap();
        assert_eq!(app.clone().oneshot(create).await.unwrap().status(), StatusCode::CREATED);

        let third = app.oneshot(get()).await.unwrap();
        assert_eq!(third.headers()["x-cache"], "MISS");
        let body = axum::body::to_bytes(third.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["files"].as_array().unwrap().len(), 1);
    }
}
