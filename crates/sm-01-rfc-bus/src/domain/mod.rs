//! Domain layer: envelope model, pending-call table, errors.

pub mod envelope;
pub mod errors;
pub mod pending;

pub use envelope::{rfc_schema, CommandId, RfcEnvelope};
pub use errors::{RemoteError, Result, RfcError, RfcHandlerError, HANDLER_FAILED, HANDLER_MISSING};
pub use pending::{Completion, PendingCallStore, PendingStats, RfcResponse};
