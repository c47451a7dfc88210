use serde_json::Value;
use thiserror::Error;

/// Errors returned by [`BackendClient`](crate::BackendClient).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Network or decoding failure.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx answer from the record API.
    #[error("backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Envelope call that failed: a non-zero `code`, or a non-2xx answer.
    ///
    /// `body` is the whole answer (a JSON string when it was not JSON) and
    /// `code` falls back to the HTTP status when the body has none.
    #[error("backend rejected the request with HTTP {status}, code {code}")]
    Response { status: u16, code: i64, body: Value },

    /// The request was aborted through its cancellation token.
    #[error("request cancelled")]
    Cancelled,
}

impl ClientError {
    /// Cancellation is expected and never worth reporting.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
