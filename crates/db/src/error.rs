//! Typed error type for the db crate.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{collection} row {id} not found")]
    NotFound { collection: &'static str, id: Uuid },

    #[error("{collection} row {id} already exists")]
    Duplicate { collection: &'static str, id: Uuid },

    /// The merge-patched document no longer decodes as a row.
    #[error("invalid patch: {0}")]
    InvalidPatch(#[from] serde_json::Error),
}

impl DbError {
    pub fn not_found(collection: &'static str, id: Uuid) -> Self {
        Self::NotFound { collection, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
