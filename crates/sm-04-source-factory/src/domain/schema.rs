//! The `source` record schema.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_bus::{Schema, Values};
use shared_types::{schema_names::SOURCE_SCHEMA, NodeId};

use super::config::{SourceConfig, SourceType};

/// Field names of a source record.
pub mod fields {
    pub const ID: &str = "id";
    pub const TYPE: &str = "type";
    pub const NODE_ID: &str = "nodeId";
    pub const INFOS: &str = "infos";
    pub const FRAME: &str = "frame";
    pub const ACTIVE: &str = "active";
    pub const CONTROL: &str = "control";
    pub const RECORD: &str = "record";
    pub const LOOP: &str = "loop";
    pub const FRAME_START: &str = "frameStart";
    pub const FRAME_END: &str = "frameEnd";
    pub const DURATION: &str = "duration";
}

/// Transport control of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Control {
    Play,
    Pause,
}

impl Control {
    pub fn as_str(self) -> &'static str {
        match self {
            Control::Play => "play",
            Control::Pause => "pause",
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value.as_str()? {
            "play" => Some(Control::Play),
            "pause" => Some(Control::Pause),
            _ => None,
        }
    }

    /// Initial control of a new source: replayers start paused.
    pub fn initial(source_type: SourceType) -> Self {
        match source_type {
            SourceType::StreamPlayer => Control::Pause,
            _ => Control::Play,
        }
    }
}

impl From<Control> for Value {
    fn from(control: Control) -> Self {
        Value::String(control.as_str().to_string())
    }
}

/// Schema of source records. `frame` is event-only.
pub fn source_schema() -> Schema {
    Schema::new(SOURCE_SCHEMA)
        .field(fields::ID, Value::Null)
        .field(fields::TYPE, Value::Null)
        .field(fields::NODE_ID, Value::Null)
        .field(fields::INFOS, json!({}))
        .event_field(fields::FRAME)
        .field(fields::ACTIVE, json!(false))
        .field(fields::CONTROL, json!("play"))
        .field(fields::RECORD, json!(false))
        .field(fields::LOOP, json!(false))
        .field(fields::FRAME_START, json!(0))
        .field(fields::FRAME_END, Value::Null)
        .field(fields::DURATION, Value::Null)
}

/// Initial values of the record backing `config`.
pub fn initial_values(config: &SourceConfig, owner: NodeId, infos: Value) -> Values {
    let source_type = config.source_type();
    let mut values = Values::new();
    values.insert(fields::ID.into(), json!(config.id()));
    values.insert(fields::TYPE.into(), json!(source_type.as_str()));
    values.insert(fields::NODE_ID.into(), json!(owner));
    values.insert(fields::INFOS.into(), infos);
    values.insert(fields::CONTROL.into(), Control::initial(source_type).into());
    if let SourceConfig::StreamPlayer(player) = config {
        values.insert(fields::LOOP.into(), json!(player.looping));
        values.insert(fields::FRAME_END.into(), json!(player.stream.len() - 1));
        values.insert(fields::DURATION.into(), json!(player.duration_ms()));
    }
    values
}

/// Single-field update.
pub(crate) fn update(key: &str, value: impl Into<Value>) -> Values {
    let mut values = Values::new();
    values.insert(key.to_string(), value.into());
    values
}
