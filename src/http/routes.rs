//! Item route handlers.

use super::response::{ApiError, ApiResponse};
use crate::services::ItemRepository;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde_json::Value;

type HandlerResult = Result<ApiResponse, ApiError>;

/// `GET /db`
pub async fn list_items(State(repository): State<ItemRepository>) -> HandlerResult {
    let items = repository.get_all().await?;
    Ok(ApiResponse::ok(items))
}

/// `GET /db/{id}`
pub async fn get_item(
    State(repository): State<ItemRepository>,
    Path(id): Path<String>,
) -> HandlerResult {
    let item = repository.get_by_id(&id).await?;
    Ok(ApiResponse::ok(item))
}

/// `POST /db`
pub async fn create_item(
    State(repository): State<ItemRepository>,
    payload: Result<Json<Value>, JsonRejection>,
) -> HandlerResult {
    let Json(value) = payload?;
    let item = repository.add_item(value).await?;
    Ok(ApiResponse::created(item))
}

/// `POST /db/{id}`
pub async fn update_item(
    State(repository): State<ItemRepository>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> HandlerResult {
    let Json(value) = payload?;
    let item = repository.update_by_id(&id, value).await?;
    Ok(ApiResponse::ok(item))
}

/// `DELETE /db/{id}`
pub async fn delete_item(
    State(repository): State<ItemRepository>,
    Path(id): Path<String>,
) -> HandlerResult {
    let item = repository.delete_by_id(&id).await?;
    Ok(ApiResponse::ok(item))
}

/// `DELETE /db`
pub async fn delete_all_items(State(repository): State<ItemRepository>) -> HandlerResult {
    let removed = repository.delete_all().await?;
    Ok(ApiResponse::ok(removed))
}

/// Fallback for unmatched paths.
pub async fn not_found() -> ApiError {
    ApiError::route_not_found()
}

/// Fallback for a known path with an unsupported method.
pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}
