use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use db::AccessRow;
use engine::Transition;
use uuid::Uuid;

use super::{AppState, JsonBody};
use crate::{ApiError, ApiResult};

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<AccessRow>>> {
    Ok(Json(state.service.store().list_accesses().await?))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<AccessRow>> {
    Ok(Json(state.service.store().get_access(id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody,
) -> ApiResult<(StatusCode, Json<AccessRow>)> {
    let row: AccessRow = serde_json::from_value(payload)?;
    Ok((StatusCode::CREATED, Json(state.service.create_access(row).await?)))
}

pub async fn update(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    JsonBody(patch): JsonBody,
) -> ApiResult<Json<AccessRow>> {
    match state.service.update_access(id, &patch).await? {
        Transition::Applied(row) => Ok(Json(row)),
        Transition::Stale => Err(ApiError::stale("access")),
    }
}

/// Refused with 409 while any workflow still references the access.
pub async fn delete(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<StatusCode> {
    if state.service.delete_access(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("access {id} not found")))
    }
}
