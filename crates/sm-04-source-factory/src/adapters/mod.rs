//! Adapters: sockets shared between sources and the in-memory recorder.

pub mod osc_client;
pub mod osc_udp;
pub mod recorder;
pub mod registry;
pub mod websocket;

pub use osc_client::OscClient;
pub use osc_udp::OscUdpListener;
pub use recorder::{InMemoryRecorder, RecordedSession};
pub use registry::TransportRegistry;
pub use websocket::WsServer;
