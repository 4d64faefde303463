//! Failure injection: the API keeps serving while the cache is down.

use std::sync::Arc;

use cache_shield::cache::{cached_result, FlakyBackend, MemoryBackend};
use cache_shield::resilience::CircuitState;
use serde_json::Value;

mod common;

#[tokio::test]
async fn test_cache_outage_opens_breaker_and_requests_still_succeed() {
    let flaky = Arc::new(FlakyBackend::new(Arc::new(MemoryBackend::new())));
    flaky.set_failing(true);
    let app = common::spawn_app(flaky.clone()).await;

    for _ in 0..3 {
        let res = app.client.get(app.url("/api/v1/files/")).send().await.unwrap();
        assert_eq!(res.status(), 200);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["status"], "success");
    }

    assert_eq!(app.state.cache.breaker().state(), CircuitState::Open);

    // Open circuit: requests fail fast without touching the backend.
    let calls = flaky.calls();
    let res = app.client.get(app.url("/api/v1/paths/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(flaky.calls(), calls);

    app.stop().await;
}

#[tokio::test]
async fn test_cache_recovers_after_breaker_closes() {
    let flaky = Arc::new(FlakyBackend::new(Arc::new(MemoryBackend::new())));
    flaky.set_failing(true);
    let app = common::spawn_app(flaky.clone()).await;

    app.client.get(app.url("/api/v1/files/")).send().await.unwrap();
    assert_eq!(app.state.cache.breaker().state(), CircuitState::Open);

    flaky.set_failing(false);
    app.state.cache.breaker().force_close();

    let miss = app.client.get(app.url("/api/v1/files/")).send().await.unwrap();
    assert_eq!(miss.headers()["x-cache"], "MISS");
    let hit = app.client.get(app.url("/api/v1/files/")).send().await.unwrap();
    assert_eq!(hit.headers()["x-cache"], "HIT");

    app.stop().await;
}

#[tokio::test]
async fn test_detailed_health_reports_cache_outage_without_critical() {
    let flaky = Arc::new(FlakyBackend::new(Arc::new(MemoryBackend::new())));
    flaky.set_failing(true);
    let app = common::spawn_app(flaky.clone()).await;

    let res = app
        .client
        .get(app.url("/api/v1/health/detailed?force=true"))
        .send()
        .await
        .unwrap();
    let report: Value = res.json().await.unwrap();

    assert_ne!(report["overall_status"], "critical");
    let checks = report["checks"].as_array().unwrap();
    let database = checks.iter().find(|c| c["name"] == "database").unwrap();
    assert_eq!(database["status"], "healthy");
    let cache = checks.iter().find(|c| c["name"] == "cache").unwrap();
    assert_ne!(cache["status"], "healthy");

    app.stop().await;
}

#[tokio::test]
async fn test_read_through_serves_source_while_backend_is_down() {
    let flaky = Arc::new(FlakyBackend::new(Arc::new(MemoryBackend::new())));
    let app = common::spawn_app(flaky.clone()).await;
    flaky.set_failing(true);

    let value: Result<String, String> =
        cached_result(&app.state.cache, "files:probe", None, || async { Ok("fresh".to_string()) }).await;
    assert_eq!(value.unwrap(), "fresh");

    app.stop().await;
}
