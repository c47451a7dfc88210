//! Provider-level error types.
//!
//! Field problems are never raised one at a time: callers collect every
//! [`ValidationError`] into a [`ValidationErrors`] so a form can highlight
//! all offending fields in a single pass.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single field was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reason {
    #[error("is required")]
    Missing,

    #[error("must be a {expected}")]
    WrongType { expected: String },

    #[error("must be at least {min} characters")]
    TooShort { min: usize },

    #[error("must be at most {max} characters")]
    TooLong { max: usize },

    #[error("must be between {min} and {max}")]
    OutOfRange { min: i64, max: i64 },

    #[error("must be one of {allowed:?}")]
    NotOneOf { allowed: Vec<String> },

    #[error("is malformed: {message}")]
    InvalidFormat { message: String },

    #[error("names an unknown provider")]
    UnknownProvider,
}

/// A missing or malformed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("field '{field}' {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: Reason,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: Reason) -> Self {
        Self { field: field.into(), reason }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, Reason::Missing)
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, Reason::InvalidFormat { message: message.into() })
    }
}

/// Every field problem found in one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// Returns the first error reported for `field`, if any.
    pub fn field(&self, field: &str) -> Option<&ValidationError> {
        self.0.iter().find(|e| e.field == field)
    }

    pub fn into_result<T>(self, ok: T) -> Result<T, Self> {
        if self.0.is_empty() {
            Ok(ok)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", joined.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self(errors)
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Which catalog a provider tag was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Access,
    ApplyDns,
    Deploy,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => write!(f, "access"),
            Self::ApplyDns => write!(f, "apply-dns"),
            Self::Deploy => write!(f, "deploy"),
        }
    }
}

/// A stored tag the running catalog does not know.
///
/// This signals version skew between stored data and the binary, so it is
/// never worth retrying and is not attributable to user input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("unknown {kind} provider '{tag}'")]
pub struct UnknownProviderError {
    pub kind: ProviderKind,
    pub tag: String,
}

impl UnknownProviderError {
    pub fn new(kind: ProviderKind, tag: impl Into<String>) -> Self {
        Self { kind, tag: tag.into() }
    }
}
