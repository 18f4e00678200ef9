//! Wire variants and address layout.

use rosc::{OscMessage, OscPacket};
use serde::{Deserialize, Serialize};

/// Frame header channel of the current variant.
pub const FRAME_CHANNEL: &str = "frame";

/// Address suffix of the legacy raw variants.
pub const RAW_CHANNEL: &str = "raw";

/// Device family of the legacy raw variants.
pub const RIOT_SOURCE: &str = "riot";

/// Api segment emitted when a frame does not name one.
pub const DEFAULT_API: &str = "v3";

/// Argument count of `/<id>/raw` in the full layout.
pub const RIOT_RAW_LEN: usize = 21;

/// Argument count of `/<id>/raw` in the compact layout.
pub const RIOT_RAW_COMPACT_LEN: usize = 11;

/// OSC encodings of a sensor frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WireVariant {
    /// `/<id>/raw` with 21 floats.
    RiotRaw,
    /// `/<id>/raw` with 11 floats.
    RiotRawCompact,
    /// One message per channel, values only.
    Channels,
    /// Frame header with timestamp/frequency, then one message per channel.
    #[default]
    Current,
}

impl WireVariant {
    /// Whether the frame clock comes from the bundle timetag.
    pub fn is_legacy(self) -> bool {
        !matches!(self, WireVariant::Current)
    }
}

/// Address of one message, split into segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    /// `/<id>/raw`
    Raw { id: &'a str },
    /// `/<source>/<api>/<id>/<channel...>`
    Channel {
        source: &'a str,
        api: &'a str,
        id: &'a str,
        channel: Vec<&'a str>,
    },
}

/// Split an address into a route.
pub fn parse_address(addr: &str) -> Option<Route<'_>> {
    let segments: Vec<&str> = addr.strip_prefix('/')?.split('/').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return None;
    }
    match segments.as_slice() {
        [id, raw] if *raw == RAW_CHANNEL => Some(Route::Raw { id: *id }),
        [source, api, id, channel @ ..] if !channel.is_empty() => Some(Route::Channel {
            source: *source,
            api: *api,
            id: *id,
            channel: channel.to_vec(),
        }),
        _ => None,
    }
}

/// First message of a packet, descending into nested bundles.
pub fn first_message(packet: &OscPacket) -> Option<&OscMessage> {
    match packet {
        OscPacket::Message(message) => Some(message),
        OscPacket::Bundle(bundle) => bundle.content.iter().find_map(first_message),
    }
}

/// Pick the variant from the first message of a packet.
pub fn detect(message: &OscMessage) -> Option<WireVariant> {
    match parse_address(&message.addr)? {
        Route::Raw { .. } => match message.args.len() {
            RIOT_RAW_LEN => Some(WireVariant::RiotRaw),
            RIOT_RAW_COMPACT_LEN => Some(WireVariant::RiotRawCompact),
            _ => None,
        },
        Route::Channel { channel, .. } => {
            if channel.as_slice() == [FRAME_CHANNEL] && message.args.len() == 2 {
                Some(WireVariant::Current)
            } else {
                Some(WireVariant::Channels)
            }
        }
    }
}

/// `(source, id)` of a packet without decoding it.
///
/// Used to route datagrams from a shared listener to the right source.
pub fn source_route(packet: &OscPacket) -> Option<(String, String)> {
    match parse_address(&first_message(packet)?.addr)? {
        Route::Raw { id } => Some((RIOT_SOURCE.to_string(), id.to_string())),
        Route::Channel { source, id, .. } => Some((source.to_string(), id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::{OscBundle, OscType};

    fn message(addr: &str, len: usize) -> OscMessage {
        OscMessage {
            addr: addr.to_string(),
            args: vec![OscType::Float(0.0); len],
        }
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("/0/raw"), Some(Route::Raw { id: "0" }));
        assert_eq!(
            parse_address("/riot/v3/0/absoluteorientation/euler"),
            Some(Route::Channel {
                source: "riot",
                api: "v3",
                id: "0",
                channel: vec!["absoluteorientation", "euler"],
            })
        );
        assert_eq!(parse_address("/riot/v3/0"), None);
        assert_eq!(parse_address("riot/v3/0/x"), None);
        assert_eq!(parse_address("/riot//0/x"), None);
    }

    #[test]
    fn test_detect() {
        assert_eq!(detect(&message("/3/raw", 21)), Some(WireVariant::RiotRaw));
        assert_eq!(detect(&message("/3/raw", 11)), Some(WireVariant::RiotRawCompact));
        assert_eq!(detect(&message("/3/raw", 5)), None);
        assert_eq!(detect(&message("/riot/v3/0/frame", 2)), Some(WireVariant::Current));
        assert_eq!(
            detect(&message("/riot/v3/0/accelerometer", 3)),
            Some(WireVariant::Channels)
        );
    }

    #[test]
    fn test_source_route_in_bundle() {
        let packet = OscPacket::Bundle(OscBundle {
            timetag: crate::time::IMMEDIATE,
            content: vec![OscPacket::Message(message("/comote/v3/phone/frame", 2))],
        });
        assert_eq!(
            source_route(&packet),
            Some(("comote".to_string(), "phone".to_string()))
        );
        assert_eq!(
            source_route(&OscPacket::Message(message("/7/raw", 21))),
            Some(("riot".to_string(), "7".to_string()))
        );
    }

    #[test]
    fn test_variant_serde() {
        assert_eq!(
            serde_json::to_value(WireVariant::RiotRawCompact).unwrap(),
            serde_json::json!("riot-raw-compact")
        );
        assert_eq!(WireVariant::default(), WireVariant::Current);
    }
}
