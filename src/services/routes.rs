//! `/api/v1/files` and `/api/v1/paths` handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{FileQuery, PathQuery};
use crate::http::response::{success, ApiError, CacheControl};
use crate::http::server::AppState;
use crate::store::Document;

type ApiResult<T> = Result<T, ApiError>;

pub fn file_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/files", get(list_files).post(create_file))
        .route("/api/v1/files/", get(list_files).post(create_file))
        .route("/api/v1/files/user/{user_id}", get(user_files))
        .route(
            "/api/v1/files/{id}",
            get(get_file).put(update_file).delete(delete_file),
        )
}

pub fn path_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/paths", get(list_paths).post(create_path))
        .route("/api/v1/paths/", get(list_paths).post(create_path))
        .route("/api/v1/paths/active", get(active_path))
        .route(
            "/api/v1/paths/{id}",
            get(get_path).put(update_path).delete(delete_path),
        )
}

fn require_string(document: &Document, field: &str) -> ApiResult<()> {
    match document.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(()),
        _ => Err(ApiError::BadRequest(format!(
            "field '{}' is required and must be a non-empty string",
            field
        ))),
    }
}

fn etag_for(document: &Document) -> axum::http::HeaderMap {
    let version = document
        .get("updated_at")
        .or_else(|| document.get("id"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    CacheControl::etag(version)
}

async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> ApiResult<Json<Value>> {
    let files = state.files.list(&query).await?;
    Ok(success(
        json!({
            "files": files,
            "page": query.page(),
            "page_size": query.page_size(),
        }),
        "Files retrieved successfully",
    ))
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<u32>,
}

async fn user_files(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Value>> {
    let page = query.page.unwrap_or(1).max(1);
    let files = state.files.list_for_user(&user_id, page).await?;
    Ok(success(
        json!({ "user_id": user_id, "files": files, "page": page }),
        "User files retrieved successfully",
    ))
}

async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(axum::http::HeaderMap, Json<Value>)> {
    let file = state.files.get(&id).await?;
    Ok((etag_for(&file), success(file, "File retrieved successfully")))
}

async fn create_file(
    State(state): State<AppState>,
    Json(document): Json<Document>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_string(&document, "name")?;
    let created = state.files.create(document).await?;
    Ok((StatusCode::CREATED, success(created, "File created successfully")))
}

async fn update_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<Document>,
) -> ApiResult<Json<Value>> {
    let updated = state.files.update(&id, changes).await?;
    Ok(success(updated, "File updated successfully"))
}

async fn delete_file(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    state.files.delete(&id).await?;
    Ok(success(json!({ "id": id }), "File deleted successfully"))
}

async fn list_paths(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> ApiResult<Json<Value>> {
    let paths = state.paths.list(&query).await?;
    Ok(success(paths, "Paths retrieved successfully"))
}

async fn active_path(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let path = state.paths.active().await?;
    Ok(success(path, "Active path retrieved successfully"))
}

async fn get_path(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(axum::http::HeaderMap, Json<Value>)> {
    let path = state.paths.get(&id).await?;
    Ok((etag_for(&path), success(path, "Path retrieved successfully")))
}

async fn create_path(
    State(state): State<AppState>,
    Json(document): Json<Document>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_string(&document, "path")?;
    let created = state.paths.create(document).await?;
    Ok((StatusCode::CREATED, success(created, "Path created successfully")))
}

async fn update_path(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<Document>,
) -> ApiResult<Json<Value>> {
    let updated = state.paths.update(&id, changes).await?;
    Ok(success(updated, "Path updated successfully"))
}

async fn delete_path(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    state.paths.delete(&id).await?;
    Ok(success(json!({ "id": id }), "Path deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let state = AppState::in_memory(Default::default());
        file_routes().merge(path_routes()).with_state(state)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_file_crud() {
        let app = app();
        let (status, created) = call(&app, "POST", "/api/v1/files", Some(json!({"name": "a.pdf", "owner": "u1"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "success");
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let (status, fetched) = call(&app, "GET", &format!("/api/v1/files/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["data"]["name"], "a.pdf");

        let (_, listed) = call(&app, "GET", "/api/v1/files/?owner=u1", None).await;
        assert_eq!(listed["data"]["files"].as_array().unwrap().len(), 1);

        let (status, _) = call(&app, "DELETE", &format!("/api/v1/files/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, missing) = call(&app, "GET", &format!("/api/v1/files/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(missing["status"], "error");
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let (status, body) = call(&app(), "POST", "/api/v1/files/", Some(json!({"owner": "u1"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "field 'name' is required and must be a non-empty string");
    }

    #[tokio::test]
    async fn test_paths_active_route() {
        let app = app();
        let (status, _) = call(&app, "GET", "/api/v1/paths/active", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        call(&app, "POST", "/api/v1/paths", Some(json!({"path": "/data", "active": true}))).await;
        let (status, body) = call(&app, "GET", "/api/v1/paths/active", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["path"], "/data");
    }
}
