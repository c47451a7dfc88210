//! `db` crate: pure persistence layer.
//!
//! Provides typed row structs, the [`Store`] trait and an in-memory
//! implementation of it. No business logic lives here.

pub mod error;
pub mod memory;
pub mod models;
pub mod store;

pub use error::DbError;
pub use memory::MemoryStore;
pub use models::{AccessRow, RunRow, RunStatus, Seed, WorkflowRow};
pub use store::{
    merge_patch, patch_record, AccessDeletion, ListQuery, Page, Store, DEFAULT_PER_PAGE, MAX_PER_PAGE,
    WORKFLOW_DOCUMENTS,
};
