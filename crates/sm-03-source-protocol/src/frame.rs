//! # Canonical Sensor Frame
//!
//! One sample of one device. Sources publish multichannel frames, i.e. a
//! `Vec<SensorFrame>`, even when only one device is involved.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Frames as published on a source record.
pub type MultiFrame = Vec<SensorFrame>;

/// Three-axis sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Barometer {
    pub pressure: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Thermometer {
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heading {
    pub magnetometer_heading: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Euler {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// Orientation as quaternion `[x, y, z, w]` plus Euler angles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsoluteOrientation {
    pub quaternion: [f64; 4],
    pub euler: Euler,
    /// `"bno055"` when read from the board's fusion chip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
}

impl Default for AbsoluteOrientation {
    fn default() -> Self {
        Self {
            quaternion: [0.0, 0.0, 0.0, 1.0],
            euler: Euler::default(),
            sensor: None,
            timestamp: None,
            frequency: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Battery {
    pub level: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
}

/// Canonical sensor frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorFrame {
    /// Device family, e.g. `riot` or `comote`.
    pub source: String,
    /// Device id within its family.
    pub id: String,
    /// Wire api version, e.g. `v3`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
    /// Milliseconds since the UNIX epoch.
    #[serde(default)]
    pub timestamp: f64,
    /// Hz.
    #[serde(default)]
    pub frequency: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerometer: Option<Vector3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gyroscope: Option<Vector3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnetometer: Option<Vector3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gravity: Option<Vector3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barometer: Option<Barometer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thermometer: Option<Thermometer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<Heading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absoluteorientation: Option<AbsoluteOrientation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<Battery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<BTreeMap<String, f64>>,
}

impl SensorFrame {
    pub fn new(source: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
            ..Self::default()
        }
    }

    /// Copy of this frame carrying another frame's clock.
    #[must_use]
    pub fn restamped(&self, timestamp: f64, frequency: f64) -> Self {
        Self {
            timestamp,
            frequency,
            ..self.clone()
        }
    }

    /// Value of a control entry.
    pub fn control_value(&self, name: &str) -> Option<f64> {
        self.control.as_ref().and_then(|control| control.get(name).copied())
    }

    /// Set a control entry, creating the map if needed.
    pub fn set_control(&mut self, name: impl Into<String>, value: f64) {
        self.control
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value);
    }
}
