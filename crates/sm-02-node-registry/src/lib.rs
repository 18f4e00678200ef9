//! # Sensor Mesh - Node Registry (Subsystem 02)
//!
//! Each process publishes one `node` record holding its identity:
//!
//! - `nodeId`: ephemeral, assigned by the state hub at connection
//! - `id`: stable topological id, `"server"` for the authoritative node,
//!   otherwise derived from the host name so a device keeps its id across
//!   restarts
//! - `runtime`: `node` or `browser`
//! - `role`: deployment role label
//!
//! The record is created once and never mutated; it disappears when the
//! node disconnects. Every node keeps a live collection of all node records
//! and uses it to resolve logical addresses to ephemeral ids.

pub mod errors;
pub mod identity;
pub mod service;

pub use errors::{RegistryError, Result};
pub use identity::{hostname_id, node_schema, sanitize_id};
pub use service::{NodeOptions, NodeRegistry};
