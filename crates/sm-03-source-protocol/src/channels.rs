//! Channel layout shared by the per-channel variants.
//!
//! | path                             | values |
//! |----------------------------------|--------|
//! | `accelerometer`                  | 3      |
//! | `gyroscope`                      | 3      |
//! | `magnetometer`                   | 3      |
//! | `gravity`                        | 3      |
//! | `barometer`                      | 1      |
//! | `thermometer`                    | 1      |
//! | `heading`                        | 1      |
//! | `absoluteorientation/quaternion` | 4      |
//! | `absoluteorientation/euler`      | 3      |
//! | `bno055/quaternion`              | 4      |
//! | `bno055/euler`                   | 3      |
//! | `battery`                        | 1      |
//! | `control/<name>`                 | 1      |

use tracing::trace;

use crate::errors::{ProtocolError, Result};
use crate::frame::{
    AbsoluteOrientation, Barometer, Battery, Euler, Heading, SensorFrame, Thermometer, Vector3,
};

/// Orientation sensor tag of the BNO055 fusion chip.
pub const BNO055: &str = "bno055";

const ORIENTATION: &str = "absoluteorientation";

/// Per-channel `(timestamp, frequency)`.
pub type Timing = (f64, f64);

/// One channel message, independent of the address prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    pub path: Vec<String>,
    pub timing: Option<Timing>,
    pub values: Vec<f64>,
}

impl ChannelMessage {
    fn new(path: &[&str], timing: Option<Timing>, values: Vec<f64>) -> Self {
        Self {
            path: path.iter().map(|segment| segment.to_string()).collect(),
            timing,
            values,
        }
    }
}

fn timing(timestamp: Option<f64>, frequency: Option<f64>) -> Option<Timing> {
    Some((timestamp?, frequency?))
}

fn vector_message(name: &str, vector: &Vector3) -> ChannelMessage {
    ChannelMessage::new(
        &[name],
        timing(vector.timestamp, vector.frequency),
        vec![vector.x, vector.y, vector.z],
    )
}

/// Channel messages of a frame, in canonical order.
pub fn frame_channels(frame: &SensorFrame) -> Vec<ChannelMessage> {
    let mut messages = Vec::new();
    for (name, vector) in [
        ("accelerometer", &frame.accelerometer),
        ("gyroscope", &frame.gyroscope),
        ("magnetometer", &frame.magnetometer),
        ("gravity", &frame.gravity),
    ] {
        if let Some(vector) = vector {
            messages.push(vector_message(name, vector));
        }
    }
    if let Some(barometer) = &frame.barometer {
        messages.push(ChannelMessage::new(
            &["barometer"],
            timing(barometer.timestamp, barometer.frequency),
            vec![barometer.pressure],
        ));
    }
    if let Some(thermometer) = &frame.thermometer {
        messages.push(ChannelMessage::new(
            &["thermometer"],
            timing(thermometer.timestamp, thermometer.frequency),
            vec![thermometer.temperature],
        ));
    }
    if let Some(heading) = &frame.heading {
        messages.push(ChannelMessage::new(
            &["heading"],
            timing(heading.timestamp, heading.frequency),
            vec![heading.magnetometer_heading],
        ));
    }
    if let Some(orientation) = &frame.absoluteorientation {
        let root = if orientation.sensor.as_deref() == Some(BNO055) {
            BNO055
        } else {
            ORIENTATION
        };
        let clock = timing(orientation.timestamp, orientation.frequency);
        messages.push(ChannelMessage::new(
            &[root, "quaternion"],
            clock,
            orientation.quaternion.to_vec(),
        ));
        let euler = orientation.euler;
        messages.push(ChannelMessage::new(
            &[root, "euler"],
            clock,
            vec![euler.alpha, euler.beta, euler.gamma],
        ));
    }
    if let Some(battery) = &frame.battery {
        messages.push(ChannelMessage::new(
            &["battery"],
            timing(battery.timestamp, battery.frequency),
            vec![battery.level],
        ));
    }
    if let Some(control) = &frame.control {
        for (name, value) in control {
            messages.push(ChannelMessage::new(&["control", name.as_str()], None, vec![*value]));
        }
    }
    messages
}

#[derive(Debug, Default)]
struct OrientationParts {
    quaternion: Option<[f64; 4]>,
    euler: Option<Euler>,
    timing: Option<Timing>,
}

impl OrientationParts {
    fn is_empty(&self) -> bool {
        self.quaternion.is_none() && self.euler.is_none()
    }

    fn build(self, sensor: Option<&str>) -> AbsoluteOrientation {
        let defaults = AbsoluteOrientation::default();
        AbsoluteOrientation {
            quaternion: self.quaternion.unwrap_or(defaults.quaternion),
            euler: self.euler.unwrap_or(defaults.euler),
            sensor: sensor.map(str::to_string),
            timestamp: self.timing.map(|(ts, _)| ts),
            frequency: self.timing.map(|(_, freq)| freq),
        }
    }
}

/// Accumulates channel messages into a frame.
pub struct FrameBuilder {
    frame: SensorFrame,
    bno055: bool,
    orientation: OrientationParts,
    bno: OrientationParts,
}

fn expect_len(channel: &[&str], values: &[f64], expected: usize) -> Result<()> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(ProtocolError::ValueCount {
            channel: channel.join("/"),
            expected,
            got: values.len(),
        })
    }
}

fn vector(values: &[f64], clock: Option<Timing>) -> Vector3 {
    Vector3 {
        x: values[0],
        y: values[1],
        z: values[2],
        timestamp: clock.map(|(ts, _)| ts),
        frequency: clock.map(|(_, freq)| freq),
    }
}

impl FrameBuilder {
    pub fn new(frame: SensorFrame, bno055: bool) -> Self {
        Self {
            frame,
            bno055,
            orientation: OrientationParts::default(),
            bno: OrientationParts::default(),
        }
    }

    /// Apply one channel message. Unknown channels are ignored.
    pub fn apply(&mut self, channel: &[&str], clock: Option<Timing>, values: &[f64]) -> Result<()> {
        let ts = clock.map(|(ts, _)| ts);
        let freq = clock.map(|(_, freq)| freq);
        match channel {
            [name @ ("accelerometer" | "gyroscope" | "magnetometer" | "gravity")] => {
                expect_len(channel, values, 3)?;
                let slot = match *name {
                    "accelerometer" => &mut self.frame.accelerometer,
                    "gyroscope" => &mut self.frame.gyroscope,
                    "magnetometer" => &mut self.frame.magnetometer,
                    _ => &mut self.frame.gravity,
                };
                *slot = Some(vector(values, clock));
            }
            ["barometer"] => {
                expect_len(channel, values, 1)?;
                self.frame.barometer = Some(Barometer {
                    pressure: values[0],
                    timestamp: ts,
                    frequency: freq,
                });
            }
            ["thermometer"] => {
                expect_len(channel, values, 1)?;
                self.frame.thermometer = Some(Thermometer {
                    temperature: values[0],
                    timestamp: ts,
                    frequency: freq,
                });
            }
            ["heading"] => {
                expect_len(channel, values, 1)?;
                self.frame.heading = Some(Heading {
                    magnetometer_heading: values[0],
                    timestamp: ts,
                    frequency: freq,
                });
            }
            ["battery"] => {
                expect_len(channel, values, 1)?;
                self.frame.battery = Some(Battery {
                    level: values[0],
                    timestamp: ts,
                    frequency: freq,
                });
            }
            ["control", name] => {
                expect_len(channel, values, 1)?;
                self.frame.set_control(*name, values[0]);
            }
            [root @ (ORIENTATION | BNO055), part @ ("quaternion" | "euler")] => {
                let parts = if *root == BNO055 {
                    &mut self.bno
                } else {
                    &mut self.orientation
                };
                if *part == "quaternion" {
                    expect_len(channel, values, 4)?;
                    parts.quaternion = Some([values[0], values[1], values[2], values[3]]);
                } else {
                    expect_len(channel, values, 3)?;
                    parts.euler = Some(Euler {
                        alpha: values[0],
                        beta: values[1],
                        gamma: values[2],
                    });
                }
                if clock.is_some() {
                    parts.timing = clock;
                }
            }
            other => trace!(channel = %other.join("/"), "Ignoring unknown channel"),
        }
        Ok(())
    }

    pub fn finish(mut self) -> SensorFrame {
        if self.bno055 && !self.bno.is_empty() {
            self.frame.absoluteorientation = Some(self.bno.build(Some(BNO055)));
        } else if !self.orientation.is_empty() {
            self.frame.absoluteorientation = Some(self.orientation.build(None));
        }
        self.frame
    }
}
