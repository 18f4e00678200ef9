//! Source errors.

use shared_bus::StateError;
use thiserror::Error;

/// Errors from source creation, control and teardown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// A live source already carries this id.
    #[error("Source {0:?} already exists")]
    DuplicateId(String),

    /// The `type` tag names no source type.
    #[error("Invalid source type {0:?}")]
    InvalidType(String),

    /// A required field is missing or ill-typed.
    #[error("Invalid config for source {id:?}: {reason}")]
    InvalidConfig { id: String, reason: String },

    /// A stream-player stream is malformed.
    #[error("Invalid stream for source {id:?}: {reason}")]
    InvalidStream { id: String, reason: String },

    /// The caller may not perform this operation.
    #[error("Permission denied on source {id:?}: {reason}")]
    PermissionDenied { id: String, reason: String },

    /// No source with this id is owned by this node.
    #[error("Source {0:?} not found")]
    NotFound(String),

    /// A socket could not be bound, resolved or used.
    #[error("Transport error on {endpoint}: {reason}")]
    Transport { endpoint: String, reason: String },

    /// Replicated state failure.
    #[error(transparent)]
    State(#[from] StateError),
}

impl SourceError {
    /// Stable name of the error variant, carried across the RFC bus.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::DuplicateId(_) => "DuplicateId",
            SourceError::InvalidType(_) => "InvalidType",
            SourceError::InvalidConfig { .. } => "InvalidConfig",
            SourceError::InvalidStream { .. } => "InvalidStream",
            SourceError::PermissionDenied { .. } => "PermissionDenied",
            SourceError::NotFound(_) => "NotFound",
            SourceError::Transport { .. } => "Transport",
            SourceError::State(_) => "State",
        }
    }

    pub(crate) fn config(id: &str, reason: impl Into<String>) -> Self {
        SourceError::InvalidConfig {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn stream(id: &str, reason: impl Into<String>) -> Self {
        SourceError::InvalidStream {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn transport(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        SourceError::Transport {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_argument() {
        let err = SourceError::config("riot-1", "missing field `port`");
        assert_eq!(
            err.to_string(),
            "Invalid config for source \"riot-1\": missing field `port`"
        );
        assert_eq!(err.kind(), "InvalidConfig");
        assert_eq!(
            SourceError::DuplicateId("a".into()).to_string(),
            "Source \"a\" already exists"
        );
    }
}
