//! # Sensor Mesh - Source Manager (Subsystem 05)
//!
//! **Bounded Context:** Source lifecycle across nodes
//!
//! ## Purpose
//!
//! Public façade over the source factories of every node. Creation and
//! deletion always travel through the RFC bus, even when the target is the
//! local node, so every call shares one completion path:
//!
//! ```text
//! create_source(config, node)
//!     │ local duplicate check against the visible collection
//!     │ rfc "create-source" → factory.create() on `node`
//!     │ resolver hook: wait until the new record is in the local replica
//!     ▼
//! id
//! ```
//!
//! A source record and the RFC settlement travel on different records and
//! may be observed in either order; the resolver hooks close that gap.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod errors;
pub mod handlers;
pub mod service;

pub use errors::{ManagerError, Result};
pub use handlers::{SourceAck, CREATE_SOURCE, DELETE_SOURCE};
pub use service::SourceManager;
