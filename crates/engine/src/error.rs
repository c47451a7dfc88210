//! Engine-level error types.

use providers::ValidationErrors;
use thiserror::Error;
use uuid::Uuid;

use crate::models::WorkflowReport;

/// Errors produced by the workflow engine.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Decoding errors ------

    /// Stored workflow content is neither a node arena nor a node tree.
    #[error("malformed workflow content: {0}")]
    MalformedContent(String),

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// A graph edit named a node that is not in the arena.
    #[error("no node with ID '{0}'")]
    NodeNotFound(String),

    /// A patch that is not a JSON object, or does not fit the record.
    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    /// A stored or submitted record has fields that do not parse.
    #[error("invalid record: {0}")]
    InvalidRecord(ValidationErrors),

    // ------ Transition errors ------

    /// Enabling was refused; carries the full report.
    #[error("workflow is not validated")]
    NotValidated(Box<WorkflowReport>),

    /// An access cannot be deleted while workflows still point at it.
    #[error("access {id} is used by {} workflow(s)", workflows.len())]
    AccessInUse { id: Uuid, workflows: Vec<Uuid> },

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),
}
