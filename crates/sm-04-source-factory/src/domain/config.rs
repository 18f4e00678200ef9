//! # Source Configuration
//!
//! One variant per source type, tagged by `type`. Unknown tags are rejected
//! before field decoding so the caller gets `InvalidType` rather than a
//! generic decode error.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sm_03_source_protocol::{MultiFrame, WireVariant};
use std::fmt;

use super::errors::{Result, SourceError};

/// Source type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    /// OSC over UDP hardware bridge.
    Riot,
    /// WebSocket JSON hardware bridge.
    Comote,
    /// Fan-in of several sources on the clock of the first.
    Aggregated,
    /// Re-encodes another source's frames to an OSC destination.
    OscBridge,
    /// Replays a pre-loaded stream.
    StreamPlayer,
}

impl SourceType {
    pub const ALL: [SourceType; 5] = [
        SourceType::Riot,
        SourceType::Comote,
        SourceType::Aggregated,
        SourceType::OscBridge,
        SourceType::StreamPlayer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Riot => "riot",
            SourceType::Comote => "comote",
            SourceType::Aggregated => "aggregated",
            SourceType::OscBridge => "osc-bridge",
            SourceType::StreamPlayer => "stream-player",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.as_str() == tag)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiotConfig {
    pub id: String,
    /// UDP port; 0 binds an ephemeral port.
    pub port: u16,
    #[serde(default)]
    pub bno055: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComoteConfig {
    pub id: String,
    /// WebSocket port; 0 binds an ephemeral port.
    pub port: u16,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedConfig {
    pub id: String,
    /// Input source ids; the first one is the primary clock.
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub hostname: String,
    pub port: u16,
}

impl Destination {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OscBridgeConfig {
    pub id: String,
    /// Id of the forwarded source.
    pub source: String,
    pub destination: Destination,
    #[serde(default)]
    pub variant: WireVariant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamPlayerConfig {
    pub id: String,
    pub stream: Vec<MultiFrame>,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    /// Fixed inter-frame period overriding the recorded deltas.
    #[serde(default)]
    pub forced_period_ms: Option<f64>,
}

impl StreamPlayerConfig {
    /// Recorded time span of the stream in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        match (self.stream.first(), self.stream.last()) {
            (Some(first), Some(last)) => stream_time(last) - stream_time(first),
            _ => 0.0,
        }
    }
}

/// Longest accepted `forcedPeriodMs`: one day.
pub const MAX_FORCED_PERIOD_MS: f64 = 86_400_000.0;

/// Clock of a multichannel frame: the timestamp of its first channel.
pub fn stream_time(frame: &MultiFrame) -> f64 {
    frame.first().map_or(0.0, |f| f.timestamp)
}

/// Validated configuration of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SourceConfig {
    Riot(RiotConfig),
    Comote(ComoteConfig),
    Aggregated(AggregatedConfig),
    OscBridge(OscBridgeConfig),
    StreamPlayer(StreamPlayerConfig),
}

impl SourceConfig {
    /// Decode and validate a configuration value.
    pub fn from_value(value: &Value) -> Result<Self> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let tag = match value.get("type") {
            Some(Value::String(tag)) => tag.clone(),
            Some(other) => return Err(SourceError::InvalidType(other.to_string())),
            None => return Err(SourceError::config(&id, "missing field `type`")),
        };
        if SourceType::parse(&tag).is_none() {
            return Err(SourceError::InvalidType(tag));
        }

        let config: SourceConfig = serde_json::from_value(value.clone())
            .map_err(|e| SourceError::config(&id, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn id(&self) -> &str {
        match self {
            SourceConfig::Riot(c) => &c.id,
            SourceConfig::Comote(c) => &c.id,
            SourceConfig::Aggregated(c) => &c.id,
            SourceConfig::OscBridge(c) => &c.id,
            SourceConfig::StreamPlayer(c) => &c.id,
        }
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            SourceConfig::Riot(_) => SourceType::Riot,
            SourceConfig::Comote(_) => SourceType::Comote,
            SourceConfig::Aggregated(_) => SourceType::Aggregated,
            SourceConfig::OscBridge(_) => SourceType::OscBridge,
            SourceConfig::StreamPlayer(_) => SourceType::StreamPlayer,
        }
    }

    /// Connection metadata that does not depend on bound resources.
    ///
    /// Listener types report their bound port instead, see the factory.
    pub fn static_infos(&self) -> Value {
        match self {
            SourceConfig::Riot(c) => json!({ "port": c.port }),
            SourceConfig::Comote(c) => json!({ "port": c.port }),
            SourceConfig::Aggregated(c) => json!({ "sources": c.sources }),
            SourceConfig::OscBridge(c) => json!({
                "source": c.source,
                "destination": { "hostname": c.destination.hostname, "port": c.destination.port },
            }),
            SourceConfig::StreamPlayer(c) => json!({ "frames": c.stream.len() }),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let id = self.id();
        if id.trim().is_empty() {
            return Err(SourceError::config(id, "`id` must not be empty"));
        }
        match self {
            SourceConfig::Aggregated(c) => {
                if c.sources.is_empty() {
                    return Err(SourceError::config(id, "`sources` must name at least one source"));
                }
                if c.sources.iter().any(|source| source == id) {
                    return Err(SourceError::config(id, "an aggregate cannot include itself"));
                }
            }
            SourceConfig::OscBridge(c) => {
                if c.source == id {
                    return Err(SourceError::config(id, "a bridge cannot forward itself"));
                }
                if c.destination.hostname.is_empty() || c.destination.port == 0 {
                    return Err(SourceError::config(id, "`destination` needs a hostname and a port"));
                }
            }
            SourceConfig::StreamPlayer(c) => validate_stream(c)?,
            SourceConfig::Riot(_) | SourceConfig::Comote(_) => {}
        }
        Ok(())
    }
}

fn validate_stream(config: &StreamPlayerConfig) -> Result<()> {
    let id = &config.id;
    if config.stream.len() < 2 {
        return Err(SourceError::stream(
            id,
            format!("at least 2 frames required, got {}", config.stream.len()),
        ));
    }
    if let Some(index) = config.stream.iter().position(|frame| frame.is_empty()) {
        return Err(SourceError::stream(id, format!("frame {index} has no channel")));
    }
    for (index, pair) in config.stream.windows(2).enumerate() {
        let (previous, next) = (stream_time(&pair[0]), stream_time(&pair[1]));
        if next <= previous {
            return Err(SourceError::stream(
                id,
                format!(
                    "timestamps must increase, frame {} at {next} follows {previous}",
                    index + 1
                ),
            ));
        }
    }
    match config.forced_period_ms {
        Some(period) if period.is_nan() || period <= 0.0 => Err(SourceError::config(
            id,
            format!("`forcedPeriodMs` must be positive, got {period}"),
        )),
        Some(period) if period > MAX_FORCED_PERIOD_MS => Err(SourceError::config(
            id,
            format!("`forcedPeriodMs` must not exceed {MAX_FORCED_PERIOD_MS}, got {period}"),
        )),
        _ => Ok(()),
    }
}
