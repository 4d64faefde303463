//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use cache_shield::cache::CacheBackend;
use cache_shield::config::ServiceConfig;
use cache_shield::lifecycle::Shutdown;
use cache_shield::store::MemoryDocumentStore;
use cache_shield::{AppState, HttpServer};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A running server on an ephemeral port.
pub struct TestApp {
    pub addr: SocketAddr,
    pub state: AppState,
    pub client: reqwest::Client,
    shutdown: Shutdown,
    handle: JoinHandle<()>,
    _storage: TempDir,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger graceful shutdown and wait for the server task.
    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = self.handle.await;
    }
}

/// Defaults pointed at a throwaway storage directory.
pub fn test_config(storage: &TempDir) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.server.bind_address = "127.0.0.1:0".to_string();
    config.health.storage_path = storage.path().display().to_string();
    config
}

/// Spawn the app over the given cache backend and an in-memory datastore.
pub async fn spawn_app(backend: Arc<dyn CacheBackend>) -> TestApp {
    let storage = TempDir::new().unwrap();
    let config = test_config(&storage);
    let store = MemoryDocumentStore::with_collections(config.health.expected_collections.clone());
    let state = AppState::new(config, backend, Arc::new(store));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(state.clone());
    let stopped = shutdown.wait();
    let handle = tokio::spawn(async move {
        let _ = server.run(listener, stopped).await;
    });

    let client = reqwest::Client::builder().no_proxy().build().unwrap();

    TestApp {
        addr,
        state,
        client,
        shutdown,
        handle,
        _storage: storage,
    }
}
