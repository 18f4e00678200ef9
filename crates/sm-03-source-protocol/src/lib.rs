//! # Sensor Mesh - Source Protocol (Subsystem 03)
//!
//! Pure conversion between the canonical sensor frame and its wire forms.
//!
//! ## Wire Variants
//!
//! | Variant          | First message                           | Clock                 |
//! |------------------|-----------------------------------------|-----------------------|
//! | `RiotRaw`        | `/<id>/raw`, 21 floats                  | timetag + estimation  |
//! | `RiotRawCompact` | `/<id>/raw`, 11 floats                  | timetag + estimation  |
//! | `Channels`       | `/<source>/<api>/<id>/<channel>`        | timetag + estimation  |
//! | `Current`        | `/<source>/<api>/<id>/frame` [ts, freq] | explicit              |
//!
//! ## Properties
//!
//! - Decoding then encoding with the same variant reproduces every message
//!   that contributed to the frame, byte for byte.
//! - `decode(encode(decode(b))) == decode(b)` for every variant.
//! - Two packets of one device 10 ms apart yield 100 Hz on the second; the
//!   first yields no frame.

pub mod channels;
pub mod decoder;
pub mod encoder;
pub mod errors;
pub mod frame;
pub mod json;
pub mod time;
pub mod variants;

pub use channels::BNO055;
pub use decoder::{DecoderOptions, FrameDecoder};
pub use encoder::{encode, encode_bytes};
pub use errors::{ProtocolError, Result};
pub use frame::{
    AbsoluteOrientation, Barometer, Battery, Euler, Heading, MultiFrame, SensorFrame,
    Thermometer, Vector3,
};
pub use json::{parse_json_frame, parse_json_text, COMOTE_SOURCE};
pub use variants::{source_route, WireVariant, RIOT_SOURCE};

// Re-exported so dependents share one OSC packet model.
pub use rosc::OscPacket;
