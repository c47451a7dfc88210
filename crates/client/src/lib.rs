//! HTTP client for the certdeck record API.
//!
//! [`BackendClient`] wraps the REST endpoints served by the `api` crate plus
//! the certificate archive action. [`WorkflowList`] keeps a locally displayed
//! listing consistent while optimistic edits race with background refreshes.

pub mod error;
pub mod http;
pub mod list;

pub use error::{ClientError, ClientResult};
pub use http::{ArchiveFormat, BackendClient};
pub use list::WorkflowList;
