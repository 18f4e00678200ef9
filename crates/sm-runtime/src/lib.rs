//! # Sensor Mesh - Node Runtime
//!
//! **Bounded Context:** Process wiring
//!
//! ## Purpose
//!
//! Starts every subsystem of one process against a shared state hub and
//! stops them in reverse order. The server node must start first: clients
//! join the RFC bus it creates.
//!
//! ## Module Structure
//!
//! - [`config`]: `NodeConfig` from defaults or `SM_*` environment variables
//! - [`runtime`]: `NodeRuntime`

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod runtime;

pub use config::{ConfigError, NodeConfig};
pub use runtime::NodeRuntime;
