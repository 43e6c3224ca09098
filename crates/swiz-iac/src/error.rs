//! Error types for swiz-iac

use thiserror::Error;

/// Errors reported by an infrastructure-as-code backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IacError {
    /// The named object does not exist at the backend
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    /// A stack reached a terminal failure state
    #[error("stack {name} failed: {reason}")]
    StackFailed { name: String, reason: String },

    /// The backend rejected the request before doing any work
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Any other backend error (transport, throttling, provider-side error)
    #[error("backend error: {0}")]
    Backend(String),
}

impl IacError {
    /// Shorthand for a missing stack.
    pub fn stack_not_found(name: impl Into<String>) -> Self {
        IacError::NotFound {
            kind: "stack".to_string(),
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, IacError::NotFound { .. })
    }
}

/// Result type for backend operations
pub type IacResult<T> = std::result::Result<T, IacError>;
