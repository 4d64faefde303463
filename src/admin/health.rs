//! Health endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::health::HealthStatus;
use crate::http::response::{success, ApiError};
use crate::http::server::AppState;
use crate::store::{document_id, Document, StoreError};

const PROBE_COLLECTION: &str = "health_check";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/health", get(basic_health_check))
        .route("/api/v1/health/", get(basic_health_check))
        .route("/api/v1/health/detailed", get(detailed_health_check))
        .route("/api/v1/health/check/{name}", get(single_health_check))
        .route("/api/v1/health/checks", get(list_health_checks))
        .route("/api/v1/health/status", get(health_status_summary))
}

fn status_code(status: HealthStatus) -> StatusCode {
    if status.is_failing() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// Insert, read back and delete a timestamped document.
async fn store_round_trip(state: &AppState) -> Result<DateTime<Utc>, StoreError> {
    let now = Utc::now();
    let mut probe = Document::new();
    probe.insert("created_at".to_string(), Value::String(now.to_rfc3339()));

    let inserted = state.store.insert_one(PROBE_COLLECTION, probe).await?;
    let id = document_id(&inserted)
        .ok_or_else(|| StoreError::Backend("inserted document has no id".to_string()))?
        .to_string();

    let found = state.store.find_one(PROBE_COLLECTION, &id).await?;
    state.store.delete_one(PROBE_COLLECTION, &id).await?;

    found
        .as_ref()
        .and_then(|doc| doc.get("created_at"))
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .ok_or(StoreError::NotFound {
            collection: PROBE_COLLECTION.to_string(),
            id,
        })
}

async fn basic_health_check(State(state): State<AppState>) -> Response {
    match store_round_trip(&state).await {
        Ok(at) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "date": at.format("%Y-%m-%d").to_string(),
                "time": at.format("%H:%M:%S").to_string(),
                "message": "Service is healthy",
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Basic health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "message": format!("Health check failed: {}", e),
                    "timestamp": Utc::now().to_rfc3339(),
                })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct DetailedQuery {
    #[serde(default)]
    force: bool,
}

async fn detailed_health_check(
    State(state): State<AppState>,
    Query(query): Query<DetailedQuery>,
) -> Response {
    let report = state.health.run_all_checks(query.force).await;
    (status_code(report.overall_status), Json(report)).into_response()
}

async fn single_health_check(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    match state.health.run_single_check(&name).await {
        Some(result) => Ok((status_code(result.status), Json(result)).into_response()),
        None => Err(ApiError::NotFound(format!(
            "Health check '{}' not found. Available checks: {}",
            name,
            state.health.check_names().join(", ")
        ))),
    }
}

async fn list_health_checks(State(state): State<AppState>) -> Json<Value> {
    let names = state.health.check_names();
    let total = names.len();
    success(
        json!({ "available_checks": names, "total_checks": total }),
        "Available health checks retrieved successfully",
    )
}

async fn health_status_summary(State(state): State<AppState>) -> Response {
    let report = state.health.run_all_checks(false).await;
    let critical_systems: Vec<Value> = report
        .critical_systems()
        .into_iter()
        .map(|c| json!({ "name": c.name, "status": c.status, "message": c.message }))
        .collect();

    let body = json!({
        "status": report.overall_status,
        "message": report.overall_message,
        "timestamp": report.timestamp,
        "checks_summary": report.summary,
        "critical_systems": critical_systems,
    });
    (status_code(report.overall_status), Json(body)).into_response()
}
