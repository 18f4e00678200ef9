//! Error types for the RFC bus.

use serde::{Deserialize, Serialize};
use shared_bus::StateError;
use thiserror::Error;

/// Kind reported when the executor has no handler for the requested name.
pub const HANDLER_MISSING: &str = "HandlerMissing";

/// Kind reported for a handler failure that did not name its own kind.
pub const HANDLER_FAILED: &str = "HandlerFailed";

/// Serialised error relayed in `responseErr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub kind: String,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Failure returned by an RFC handler; relayed to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RfcHandlerError {
    pub kind: String,
    pub message: String,
}

impl RfcHandlerError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Generic handler failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(HANDLER_FAILED, message)
    }
}

impl From<RfcHandlerError> for RemoteError {
    fn from(err: RfcHandlerError) -> Self {
        RemoteError {
            kind: err.kind,
            message: err.message,
        }
    }
}

/// Errors surfaced to RFC callers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RfcError {
    /// Request rejected before anything was written to the bus.
    #[error("Invalid argument for rfc {name:?}: {reason}")]
    InvalidArgument { name: String, reason: String },

    /// The executor's handler failed or was missing.
    #[error("Rfc {name:?} failed on executor ({kind}): {message}")]
    Remote {
        name: String,
        kind: String,
        message: String,
    },

    /// The acknowledgement could not be decoded into the requested type.
    #[error("Rfc {name:?} returned an unexpected value: {reason}")]
    Serialization { name: String, reason: String },

    /// The dispatcher stopped before the call settled.
    #[error("Rfc bus closed while {name:?} was pending")]
    BusClosed { name: String },

    /// The replicated state layer refused an operation.
    #[error("Rfc bus state error: {0}")]
    State(#[from] StateError),
}

impl RfcError {
    /// `kind` of a remote failure, if this is one.
    pub fn remote_kind(&self) -> Option<&str> {
        match self {
            RfcError::Remote { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// Result type alias for RFC operations.
pub type Result<T> = std::result::Result<T, RfcError>;
