//! Codec errors.

use thiserror::Error;

/// Errors from decoding or encoding one datagram.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// The OSC layer rejected the bytes or packet.
    #[error("OSC error: {0}")]
    Osc(String),

    /// A bundle with no message in it.
    #[error("Empty OSC packet")]
    EmptyPacket,

    /// The first address matches no known wire variant.
    #[error("Unknown address pattern {0:?}")]
    UnknownAddress(String),

    /// `/<id>/raw` with an argument count of no known layout.
    #[error("Unsupported raw layout at {address:?}: {len} arguments")]
    UnsupportedLayout { address: String, len: usize },

    /// A channel message carries the wrong number of values.
    #[error("Channel {channel:?} expects {expected} values, got {got}")]
    ValueCount {
        channel: String,
        expected: usize,
        got: usize,
    },

    /// A message argument is not numeric.
    #[error("Argument {index} of {address:?} is not numeric")]
    InvalidArgument { address: String, index: usize },

    /// Encoding needs a field the frame does not have.
    #[error("Frame is missing {0}")]
    MissingField(&'static str),

    /// A JSON datagram from an unexpected device family.
    #[error("Expected source {expected:?}, got {got:?}")]
    WrongSource { expected: String, got: String },

    /// A JSON datagram that is not a sensor frame.
    #[error("Invalid JSON frame: {0}")]
    Json(String),
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
