//! Source manager errors.

use sm_01_rfc_bus::RfcError;
use sm_04_source_factory::SourceError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManagerError {
    /// Rejected on this node before any call was made.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The call failed on the bus or on the executing node.
    #[error(transparent)]
    Rfc(#[from] RfcError),
}

impl ManagerError {
    /// Kind of the failure, whichever node it happened on.
    ///
    /// Source failures on a remote node keep their [`SourceError::kind`].
    pub fn kind(&self) -> &str {
        match self {
            ManagerError::Source(e) => e.kind(),
            ManagerError::Rfc(e) => e.remote_kind().unwrap_or("Rfc"),
        }
    }
}

pub type Result<T> = std::result::Result<T, ManagerError>;
