use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use db::{ListQuery, Page, WorkflowRow};
use engine::{NodeSummary, Transition, WorkflowReport};
use uuid::Uuid;

use super::{AppState, JsonBody};
use crate::{ApiError, ApiResult};

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<WorkflowRow>>> {
    Ok(Json(state.service.store().list_workflows(query).await?))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<WorkflowRow>> {
    Ok(Json(state.service.store().get_workflow(id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody,
) -> ApiResult<(StatusCode, Json<WorkflowRow>)> {
    let row: WorkflowRow = serde_json::from_value(payload)?;
    let model = state.service.create_workflow(row).await?;
    Ok((StatusCode::CREATED, Json(model.into_row()?)))
}

/// Merge-patch a workflow. `{"enabled": true}` is refused with 409 and the
/// full report when the merged workflow does not validate.
pub async fn update(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    JsonBody(patch): JsonBody,
) -> ApiResult<Json<WorkflowRow>> {
    match state.service.update_workflow(id, &patch).await? {
        Transition::Applied(model) => Ok(Json(model.into_row()?)),
        Transition::Stale => Err(ApiError::stale("workflow")),
    }
}

pub async fn delete(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<StatusCode> {
    if state.service.delete_workflow(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("workflow {id} not found")))
    }
}

pub async fn nodes(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<NodeSummary>>> {
    Ok(Json(state.service.node_summaries(id).await?))
}

pub async fn report(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<WorkflowReport>> {
    Ok(Json(state.service.validate_workflow(id).await?))
}
