//! # Shared Types Crate
//!
//! Identity and naming types used by every subsystem of the mesh.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: node identity, record ids and schema names
//!   are defined here and nowhere else.
//! - **Ephemeral vs. topological identity**: a [`NodeId`] is handed out by the
//!   transport for one live connection, while [`NodeIdentity::id`] survives
//!   restarts of the same physical device.

pub mod entities;
pub mod errors;
pub mod schema_names;
pub mod time;

pub use entities::*;
pub use errors::*;
pub use time::{SystemTimeSource, TimeSource};
