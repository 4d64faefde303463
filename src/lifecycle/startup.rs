//! Startup orchestration.
//!
//! # Responsibilities
//! - Select the cache backend from configuration
//! - Initialize subsystems in dependency order
//! - Bind the listener and serve until shutdown
//! - Release the cache pool on the way out
//!
//! # Design Decisions
//! - Configuration and bind errors are fatal
//! - Cache connectivity errors are not: requests are served uncached

use std::sync::Arc;

use tokio::net::TcpListener;

use super::shutdown::Shutdown;
use crate::cache::{BackendError, CacheBackend, MemoryBackend, RedisBackend};
use crate::config::ServiceConfig;
use crate::http::{AppState, HttpServer};
use crate::store::MemoryDocumentStore;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("cache backend: {0}")]
    Backend(#[from] BackendError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the application state, choosing Redis or the in-process cache.
pub fn build_state(config: ServiceConfig) -> Result<AppState, StartupError> {
    let backend: Arc<dyn CacheBackend> = if config.redis.enabled {
        Arc::new(RedisBackend::new(&config.redis)?)
    } else {
        tracing::warn!("Redis disabled, using in-process cache");
        Arc::new(MemoryBackend::new())
    };
    let store = MemoryDocumentStore::with_collections(config.health.expected_collections.clone());
    Ok(AppState::new(config, backend, Arc::new(store)))
}

/// Run the service until `shutdown` is triggered.
pub async fn run(config: ServiceConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    let state = build_state(config)?;
    let stopped = shutdown.wait();

    if let Err(e) = state.cache.initialize().await {
        tracing::warn!(error = %e, "Cache unavailable at startup, serving uncached until it recovers");
    }

    let listener = TcpListener::bind(&state.config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    HttpServer::new(state.clone())
        .run(listener, stopped)
        .await?;

    state.cache.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
