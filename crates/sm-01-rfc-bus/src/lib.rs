//! # Sensor Mesh - RFC Bus (Subsystem 01)
//!
//! **Bounded Context:** Remote function calls between nodes
//!
//! ## Purpose
//!
//! Lets any node invoke a named, single-argument operation on any other node
//! (itself included) and get back a correlated result or error. The only
//! transport is one replicated record (`rfc`) shared by the process group and
//! used as a common outbox/inbox.
//!
//! ## Protocol
//!
//! ```text
//! requester                    bus record                     executor
//!     │  {settled:false, ...}  ┌──────────┐                       │
//!     │ ─────────────────────→ │   rfc    │ ────────────────────→ │ handler(payload)
//!     │                        │          │ {settled:true, ack}   │
//!     │ ←───────────────────── │          │ ←──────────────────── │
//!  resolver hook, then resolve └──────────┘
//! ```
//!
//! 1. The requester allocates the next `commandId`, registers a pending
//!    entry, then writes an unsettled envelope.
//! 2. Only the node whose id equals `executorNodeId` acts: it runs the
//!    handler on its own task and overwrites the envelope with the settled
//!    response (`responseAck` or `responseErr`).
//! 3. Only the node whose id equals `sourceNodeId` acts on the settled
//!    envelope: it completes the pending entry, runs the resolver hook for
//!    the call name if any, then resolves the caller.
//!
//! ## Invariants
//!
//! - `(sourceNodeId, commandId)` identifies one call; command ids increase
//!   per node and are never reused.
//! - A missing handler rejects the call with kind `HandlerMissing`; the
//!   executor keeps running.
//! - A settled envelope with no pending entry is logged and counted, never
//!   resolved against another caller.
//!
//! ## Module Structure
//!
//! - [`domain`]: envelope, pending-call table, errors
//! - [`ports`]: `RfcHandler` and `ResolverHook`
//! - [`service`]: `RfcBus` (request path + dispatcher)

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;

pub use domain::{
    rfc_schema, CommandId, RemoteError, RfcEnvelope, RfcError, RfcHandlerError, HANDLER_FAILED,
    HANDLER_MISSING,
};
pub use ports::{handler_fn, ResolverHook, RfcHandler};
pub use service::RfcBus;
