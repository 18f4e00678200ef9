//! # Sensor Mesh Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── codec_benchmarks.rs   # Wire encode/decode throughput
//! └── src/
//!     └── integration/          # Several nodes on one in-process hub
//!         ├── rfc_flows.rs
//!         ├── source_flows.rs
//!         ├── transport_flows.rs
//!         └── codec_flows.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p sm-tests
//! cargo test -p sm-tests integration::source_flows
//! cargo bench -p sm-tests
//! ```

pub mod integration;
