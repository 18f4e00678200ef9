//! # Sensor Mesh - Source Factory (Subsystem 04)
//!
//! **Bounded Context:** Live and replayed sensor sources
//!
//! ## Purpose
//!
//! Turns heterogeneous device protocols into one canonical multichannel
//! frame published on a replicated `source` record. The factory owns the
//! sources of its node and the transports they share.
//!
//! ## Source Types
//!
//! | `type`          | Input                           | `active` follows        |
//! |-----------------|---------------------------------|-------------------------|
//! | `riot`          | OSC bundles on a UDP port       | watchdog on datagrams   |
//! | `comote`        | JSON datagrams on a WebSocket   | watchdog on datagrams   |
//! | `aggregated`    | other sources, first is primary | watchdog on primary     |
//! | `osc-bridge`    | another source                  | the forwarded source    |
//! | `stream-player` | a pre-loaded stream             | playback                |
//!
//! ## Invariants
//!
//! - A source id names at most one visible source. Creation checks it
//!   before anything is bound or written.
//! - Only the owner writes `frame` and `active`; any node may write
//!   `control`, `loop`, `record` and the playback range.
//! - Deleting a source cancels its timers before its record is released.
//! - Transports are shared per port or destination and closed only on
//!   factory shutdown.
//!
//! ## Module Structure
//!
//! - [`domain`]: configuration, record schema, errors
//! - [`ports`]: `FrameRecorder` / `FrameWriter`
//! - [`adapters`]: UDP, WebSocket and OSC client transports, transport registry
//! - [`timing`]: watchdog and playback scheduler
//! - [`sources`]: one module per source type
//! - [`service`]: `SourceFactory`
//! - [`view`]: `SourceView`

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod sources;
pub mod timing;
pub mod view;

pub use adapters::{InMemoryRecorder, RecordedSession, TransportRegistry};
pub use domain::{
    fields, source_schema, Control, Destination, Result, SourceConfig, SourceError, SourceType,
};
pub use ports::{FrameRecorder, FrameWriter, NoopRecorder};
pub use service::{FactoryOptions, SourceFactory};
pub use view::SourceView;
