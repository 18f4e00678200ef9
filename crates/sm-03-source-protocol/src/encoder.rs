//! # Frame Encoder
//!
//! Canonical frame to OSC bundle, the inverse of [`FrameDecoder`].
//! Channel values travel as `float`, timestamps and frequencies as `double`.
//!
//! [`FrameDecoder`]: crate::decoder::FrameDecoder

use rosc::{OscBundle, OscMessage, OscPacket, OscType};

use crate::channels::frame_channels;
use crate::errors::{ProtocolError, Result};
use crate::frame::SensorFrame;
use crate::time::ms_to_timetag;
use crate::variants::{WireVariant, DEFAULT_API, FRAME_CHANNEL, RAW_CHANNEL, RIOT_RAW_COMPACT_LEN};

/// Encode a frame as one bundle timestamped with the frame's clock.
pub fn encode(frame: &SensorFrame, variant: WireVariant) -> Result<OscPacket> {
    if frame.id.is_empty() {
        return Err(ProtocolError::MissingField("id"));
    }
    let content = match variant {
        WireVariant::RiotRaw => vec![raw_message(frame, false)],
        WireVariant::RiotRawCompact => vec![raw_message(frame, true)],
        WireVariant::Channels => channel_messages(frame, false)?,
        WireVariant::Current => channel_messages(frame, true)?,
    };
    Ok(OscPacket::Bundle(OscBundle {
        timetag: ms_to_timetag(frame.timestamp),
        content: content.into_iter().map(OscPacket::Message).collect(),
    }))
}

/// Encode a frame into a datagram.
pub fn encode_bytes(frame: &SensorFrame, variant: WireVariant) -> Result<Vec<u8>> {
    let packet = encode(frame, variant)?;
    rosc::encoder::encode(&packet).map_err(|e| ProtocolError::Osc(format!("{e:?}")))
}

fn float(value: f64) -> OscType {
    OscType::Float(value as f32)
}

fn raw_message(frame: &SensorFrame, compact: bool) -> OscMessage {
    let mut values = Vec::with_capacity(21);
    for vector in [&frame.accelerometer, &frame.gyroscope, &frame.magnetometer] {
        let vector = vector.unwrap_or_default();
        values.extend([vector.x, vector.y, vector.z]);
    }
    values.push(frame.thermometer.map_or(0.0, |t| t.temperature));
    values.push(frame.control_value("switch").unwrap_or(0.0));

    if !compact {
        values.push(frame.control_value("analog1").unwrap_or(0.0));
        values.push(frame.control_value("analog2").unwrap_or(0.0));
        let orientation = frame.absoluteorientation.clone().unwrap_or_default();
        values.extend(orientation.quaternion);
        values.extend([
            orientation.euler.alpha,
            orientation.euler.beta,
            orientation.euler.gamma,
        ]);
        values.push(frame.heading.map_or(0.0, |h| h.magnetometer_heading));
    } else {
        debug_assert_eq!(values.len(), RIOT_RAW_COMPACT_LEN);
    }

    OscMessage {
        addr: format!("/{}/{}", frame.id, RAW_CHANNEL),
        args: values.into_iter().map(float).collect(),
    }
}

fn channel_messages(frame: &SensorFrame, with_header: bool) -> Result<Vec<OscMessage>> {
    if frame.source.is_empty() {
        return Err(ProtocolError::MissingField("source"));
    }
    let prefix = format!(
        "/{}/{}/{}",
        frame.source,
        frame.api.as_deref().unwrap_or(DEFAULT_API),
        frame.id
    );

    let mut messages = Vec::new();
    if with_header {
        messages.push(OscMessage {
            addr: format!("{prefix}/{FRAME_CHANNEL}"),
            args: vec![
                OscType::Double(frame.timestamp),
                OscType::Double(frame.frequency),
            ],
        });
    }
    for channel in frame_channels(frame) {
        let mut args = Vec::with_capacity(channel.values.len() + 2);
        if with_header {
            if let Some((ts, freq)) = channel.timing {
                args.push(OscType::Double(ts));
                args.push(OscType::Double(freq));
            }
        }
        args.extend(channel.values.into_iter().map(float));
        messages.push(OscMessage {
            addr: format!("{prefix}/{}", channel.path.join("/")),
            args,
        });
    }
    Ok(messages)
}
