//! # Shared Bus - Replicated State Primitive
//!
//! Every inter-node interaction of the mesh goes through replicated records.
//! A record's schema is declared once; the record is created (owned) on one
//! node and attached (read view + write capability) on any other node.
//!
//! ## Topology
//!
//! ```text
//! ┌──────────────┐   create()/set()   ┌──────────────┐   subscribe()   ┌──────────────┐
//! │  Node A      │ ─────────────────→ │   StateHub   │ ──────────────→ │  Node B      │
//! │ (owner)      │                    │ (fan-out)    │                 │ (attached)   │
//! └──────────────┘                    └──────────────┘                 └──────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Per-record total order:** mutations are fanned out under the hub lock,
//!   so every observer sees one record's updates in emission order.
//! - **Owner first:** the writer's own observers are notified before the
//!   call to `set()` returns.
//! - **Disconnect cleanup:** records owned by a node are deleted when that
//!   node disconnects.
//! - **Event fields:** fields flagged as events (e.g. a source `frame`) are
//!   delivered to observers but never stored.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod collection;
pub mod errors;
pub mod events;
pub mod hub;
pub mod record;
pub mod schema;
pub mod subscriber;

// Re-export main types
pub use client::StateClient;
pub use collection::Collection;
pub use errors::StateError;
pub use events::{CollectionEvent, RecordEvent, RecordSnapshot};
pub use hub::StateHub;
pub use record::SharedRecord;
pub use schema::{FieldSpec, Schema};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Record values as carried on the wire.
pub type Values = serde_json::Map<String, serde_json::Value>;
