//! # Error Types
//!
//! Errors shared across subsystems.

use thiserror::Error;

/// Errors raised while building or parsing node identities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// Runtime label is neither `node` nor `browser`.
    #[error("Unknown runtime: {0}")]
    UnknownRuntime(String),

    /// The stable id is empty after sanitisation.
    #[error("Invalid node id: {0:?}")]
    InvalidId(String),
}
