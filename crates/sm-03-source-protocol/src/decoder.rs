//! # Frame Decoder
//!
//! OSC packet to canonical frame. The variant is picked from the address
//! and argument count of the first message.
//!
//! Legacy variants carry no frequency: it is estimated from the delta with
//! the previous packet of the same device, so the decoder keeps one
//! timestamp per device and the first packet of a device yields `Ok(None)`.

use rosc::{OscMessage, OscPacket, OscTime, OscType};
use shared_types::{SystemTimeSource, TimeSource};
use std::collections::HashMap;
use std::sync::Arc;

use crate::channels::{FrameBuilder, Timing};
use crate::errors::{ProtocolError, Result};
use crate::frame::{AbsoluteOrientation, Euler, Heading, SensorFrame, Thermometer, Vector3};
use crate::time::{is_immediate, micros_to_ms, ms_to_micros, timetag_to_micros};
use crate::variants::{detect, parse_address, Route, WireVariant, RIOT_RAW_LEN, RIOT_SOURCE};

/// Decoder behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Read orientation from the `bno055/...` channels when present.
    pub bno055: bool,
}

/// Stateful decoder: one per listening source.
pub struct FrameDecoder {
    options: DecoderOptions,
    clock: Arc<dyn TimeSource>,
    history: HashMap<String, i64>,
}

impl FrameDecoder {
    pub fn new(options: DecoderOptions) -> Self {
        Self::with_clock(options, Arc::new(SystemTimeSource))
    }

    /// Decoder whose clock stamps untimed packets.
    pub fn with_clock(options: DecoderOptions, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            options,
            clock,
            history: HashMap::new(),
        }
    }

    pub fn options(&self) -> DecoderOptions {
        self.options
    }

    /// Forget every device's previous timestamp.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Decode one datagram.
    pub fn decode_bytes(&mut self, bytes: &[u8]) -> Result<Option<SensorFrame>> {
        let (_, packet) =
            rosc::decoder::decode_udp(bytes).map_err(|e| ProtocolError::Osc(format!("{e:?}")))?;
        self.decode(&packet)
    }

    /// Decode one packet.
    ///
    /// `Ok(None)` means there is not enough history yet to estimate the
    /// frequency; the caller drops the packet.
    pub fn decode(&mut self, packet: &OscPacket) -> Result<Option<SensorFrame>> {
        let (timetag, messages) = flatten(packet);
        let first = *messages.first().ok_or(ProtocolError::EmptyPacket)?;

        let variant = detect(first).ok_or_else(|| match parse_address(&first.addr) {
            Some(Route::Raw { .. }) => ProtocolError::UnsupportedLayout {
                address: first.addr.clone(),
                len: first.args.len(),
            },
            _ => ProtocolError::UnknownAddress(first.addr.clone()),
        })?;

        match variant {
            WireVariant::RiotRaw | WireVariant::RiotRawCompact => {
                let frame = decode_raw(first)?;
                Ok(self.stamp(frame, timetag))
            }
            WireVariant::Channels => {
                let frame = self.decode_channels(&messages, false)?;
                Ok(self.stamp(frame, timetag))
            }
            WireVariant::Current => self.decode_channels(&messages, true).map(Some),
        }
    }

    /// Apply the timetag clock and the estimated frequency.
    fn stamp(&mut self, mut frame: SensorFrame, timetag: Option<OscTime>) -> Option<SensorFrame> {
        let micros = match timetag {
            Some(time) if !is_immediate(&time) => timetag_to_micros(&time),
            _ => ms_to_micros(self.clock.now_ms()),
        };
        let key = format!("{}/{}", frame.source, frame.id);
        let previous = self.history.insert(key, micros);
        let delta = micros - previous?;
        if delta <= 0 {
            return None;
        }
        frame.timestamp = micros_to_ms(micros);
        frame.frequency = 1e6 / delta as f64;
        Some(frame)
    }

    fn decode_channels(&self, messages: &[&OscMessage], with_header: bool) -> Result<SensorFrame> {
        let first = messages[0];
        let Some(Route::Channel {
            source, api, id, ..
        }) = parse_address(&first.addr)
        else {
            return Err(ProtocolError::UnknownAddress(first.addr.clone()));
        };

        let mut frame = SensorFrame::new(source, id);
        frame.api = Some(api.to_string());
        let mut rest = messages;
        if with_header {
            let header = numbers(first, &first.args)?;
            frame.timestamp = header[0];
            frame.frequency = header[1];
            rest = &messages[1..];
        }

        let mut builder = FrameBuilder::new(frame, self.options.bno055);
        for message in rest {
            let Some(Route::Channel {
                source: msg_source,
                id: msg_id,
                channel,
                ..
            }) = parse_address(&message.addr)
            else {
                continue;
            };
            if msg_source != source || msg_id != id {
                continue;
            }
            let (clock, values) = split_timing(message)?;
            builder.apply(&channel, clock, &values)?;
        }
        Ok(builder.finish())
    }
}

/// Outer timetag and every message of a packet, in order.
fn flatten(packet: &OscPacket) -> (Option<OscTime>, Vec<&OscMessage>) {
    fn collect<'a>(packet: &'a OscPacket, out: &mut Vec<&'a OscMessage>) {
        match packet {
            OscPacket::Message(message) => out.push(message),
            OscPacket::Bundle(bundle) => {
                for inner in &bundle.content {
                    collect(inner, out);
                }
            }
        }
    }

    let timetag = match packet {
        OscPacket::Bundle(bundle) => Some(bundle.timetag),
        OscPacket::Message(_) => None,
    };
    let mut messages = Vec::new();
    collect(packet, &mut messages);
    (timetag, messages)
}

fn number(arg: &OscType) -> Option<f64> {
    match arg {
        OscType::Float(v) => Some(f64::from(*v)),
        OscType::Double(v) => Some(*v),
        OscType::Int(v) => Some(f64::from(*v)),
        OscType::Long(v) => Some(*v as f64),
        _ => None,
    }
}

fn numbers(message: &OscMessage, args: &[OscType]) -> Result<Vec<f64>> {
    args.iter()
        .enumerate()
        .map(|(index, arg)| {
            number(arg).ok_or_else(|| ProtocolError::InvalidArgument {
                address: message.addr.clone(),
                index,
            })
        })
        .collect()
}

/// A channel message is either `values` or `[timestamp, frequency, values...]`,
/// the two leading numbers being doubles.
fn split_timing(message: &OscMessage) -> Result<(Option<Timing>, Vec<f64>)> {
    match message.args.as_slice() {
        [OscType::Double(ts), OscType::Double(freq), values @ ..] => {
            Ok((Some((*ts, *freq)), numbers(message, values)?))
        }
        args => Ok((None, numbers(message, args)?)),
    }
}

fn decode_raw(message: &OscMessage) -> Result<SensorFrame> {
    let Some(Route::Raw { id }) = parse_address(&message.addr) else {
        return Err(ProtocolError::UnknownAddress(message.addr.clone()));
    };
    let v = numbers(message, &message.args)?;

    let mut frame = SensorFrame::new(RIOT_SOURCE, id);
    frame.accelerometer = Some(Vector3::new(v[0], v[1], v[2]));
    frame.gyroscope = Some(Vector3::new(v[3], v[4], v[5]));
    frame.magnetometer = Some(Vector3::new(v[6], v[7], v[8]));
    frame.thermometer = Some(Thermometer {
        temperature: v[9],
        ..Thermometer::default()
    });
    frame.set_control("switch", v[10]);

    if v.len() == RIOT_RAW_LEN {
        frame.set_control("analog1", v[11]);
        frame.set_control("analog2", v[12]);
        frame.absoluteorientation = Some(AbsoluteOrientation {
            quaternion: [v[13], v[14], v[15], v[16]],
            euler: Euler {
                alpha: v[17],
                beta: v[18],
                gamma: v[19],
            },
            ..AbsoluteOrientation::default()
        });
        frame.heading = Some(Heading {
            magnetometer_heading: v[20],
            ..Heading::default()
        });
    }
    Ok(frame)
}
