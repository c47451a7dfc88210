//! Error type shared by every handler, and its JSON rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use db::DbError;
use engine::EngineError;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request: bad JSON, bad patch, bad content.
    #[error("{0}")]
    BadRequest(String),

    /// Field-level validation failures, returned wholesale.
    #[error("{message}")]
    Validation { message: String, errors: Value },

    /// Resource not found
    #[error("{0}")]
    NotFound(String),

    /// Not validated, still referenced, or changed concurrently.
    #[error("{message}")]
    Conflict { message: String, errors: Option<Value> },

    /// Internal error
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn stale(what: &str) -> Self {
        Self::Conflict { message: format!("{what} was changed by someone else; reload and retry"), errors: None }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }

        let message = self.to_string();
        let errors = match self {
            Self::Validation { errors, .. } => Some(errors),
            Self::Conflict { errors, .. } => errors,
            _ => None,
        };
        (status, Json(ErrorResponse { code: status.as_u16(), message, errors })).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { .. } => Self::NotFound(e.to_string()),
            DbError::Duplicate { .. } => Self::Conflict { message: e.to_string(), errors: None },
            DbError::InvalidPatch(_) => Self::BadRequest(e.to_string()),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::MalformedContent(_)
            | EngineError::DuplicateNodeId(_)
            | EngineError::NodeNotFound(_)
            | EngineError::InvalidPatch(_) => Self::BadRequest(e.to_string()),
            EngineError::InvalidRecord(errors) => Self::Validation {
                message: "record failed validation".into(),
                errors: serde_json::to_value(errors).unwrap_or(Value::Null),
            },
            EngineError::NotValidated(report) => Self::Conflict {
                message: "workflow is not validated and cannot be enabled".into(),
                errors: serde_json::to_value(*report).ok(),
            },
            EngineError::AccessInUse { id, workflows } => Self::Conflict {
                message: format!("access {id} is still used by {} workflow(s)", workflows.len()),
                errors: Some(json!({ "workflows": workflows })),
            },
            EngineError::Database(e) => e.into(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::BadRequest(e.to_string())
    }
}

/// Result type alias for handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn engine_errors_map_to_statuses() {
        let not_found: ApiError = EngineError::Database(DbError::not_found("workflow", Uuid::nil())).into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let in_use: ApiError = EngineError::AccessInUse { id: Uuid::nil(), workflows: vec![Uuid::nil()] }.into();
        assert_eq!(in_use.status(), StatusCode::CONFLICT);

        let bad: ApiError = EngineError::InvalidPatch("nope".into()).into();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let invalid: ApiError = EngineError::InvalidRecord(Default::default()).into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    }
}
