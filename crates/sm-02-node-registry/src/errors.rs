//! Error types for the node registry.

use shared_bus::StateError;
use shared_types::IdentityError;
use thiserror::Error;

/// Errors from node registration and resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Another live node already claims the `server` identity.
    #[error("A server node is already registered (node {0})")]
    DuplicateServer(u32),

    /// A non-server node tried to use the reserved `server` id.
    #[error("Id {0:?} is reserved for the server node")]
    ReservedId(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
