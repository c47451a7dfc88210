use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use db::RunRow;
use engine::WorkflowRun;
use serde_json::Value;
use uuid::Uuid;

use super::{AppState, JsonBody};
use crate::{ApiError, ApiResult};

pub async fn list(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<WorkflowRun>>> {
    Ok(Json(state.service.list_runs(id).await?))
}

/// Record a run reported by the executor. The path decides the workflow.
pub async fn record(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    JsonBody(mut payload): JsonBody,
) -> ApiResult<(StatusCode, Json<WorkflowRun>)> {
    let Value::Object(members) = &mut payload else {
        return Err(ApiError::BadRequest("run must be a JSON object".into()));
    };
    members.insert("workflowId".into(), Value::String(id.to_string()));
    let row: RunRow = serde_json::from_value(payload)?;
    let run = state.service.record_run(row).await?;
    Ok((StatusCode::CREATED, Json(run)))
}
