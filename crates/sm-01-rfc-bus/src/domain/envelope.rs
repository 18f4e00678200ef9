//! RFC envelope carried by the bus record.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_bus::{Schema, Values};
use shared_types::{schema_names::RFC_SCHEMA, NodeId};

use super::errors::RemoteError;

/// Allocated per requesting node, monotonically increasing.
pub type CommandId = u64;

/// One request or settled response.
///
/// Written once as a request, then overwritten in place by the executor with
/// the settled response. `(source_node_id, command_id)` identifies the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RfcEnvelope {
    pub name: String,
    pub source_node_id: NodeId,
    pub executor_node_id: NodeId,
    pub command_id: CommandId,
    pub payload: Value,
    pub settled: bool,
    #[serde(default)]
    pub response_ack: Option<Value>,
    #[serde(default)]
    pub response_err: Option<RemoteError>,
}

impl RfcEnvelope {
    /// Build an unsettled request.
    pub fn request(
        name: &str,
        source_node_id: NodeId,
        executor_node_id: NodeId,
        command_id: CommandId,
        payload: Value,
    ) -> Self {
        Self {
            name: name.to_string(),
            source_node_id,
            executor_node_id,
            command_id,
            payload,
            settled: false,
            response_ack: None,
            response_err: None,
        }
    }

    /// Settle with the handler's outcome.
    #[must_use]
    pub fn settle(mut self, outcome: Result<Value, RemoteError>) -> Self {
        self.settled = true;
        match outcome {
            Ok(ack) => self.response_ack = Some(ack),
            Err(err) => self.response_err = Some(err),
        }
        self
    }

    /// Full record write. Every field is present so no stale response survives.
    pub fn to_values(&self) -> Values {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Values::new(),
        }
    }

    /// Parse a full record write; `None` for partial or foreign writes.
    pub fn from_values(values: &Values) -> Option<Self> {
        serde_json::from_value(Value::Object(values.clone())).ok()
    }
}

/// Declaration of the `rfc` bus record.
pub fn rfc_schema() -> Schema {
    Schema::new(RFC_SCHEMA)
        .field("name", Value::Null)
        .field("sourceNodeId", Value::Null)
        .field("executorNodeId", Value::Null)
        .field("commandId", Value::Null)
        .field("payload", Value::Null)
        .field("settled", Value::Bool(false))
        .field("responseAck", Value::Null)
        .field("responseErr", Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_writes_every_field() {
        let envelope = RfcEnvelope::request("ping", 1, 2, 7, json!({"a": 1}));
        let values = envelope.to_values();
        assert_eq!(values.len(), 8);
        assert_eq!(values["responseAck"], Value::Null);
        assert_eq!(values["commandId"], json!(7));
        assert!(rfc_schema().validate(&values).is_ok());
    }

    #[test]
    fn test_settle_roundtrip() {
        let settled = RfcEnvelope::request("ping", 1, 2, 7, Value::Null).settle(Err(
            RemoteError::new("HandlerFailed", "boom"),
        ));
        let parsed = RfcEnvelope::from_values(&settled.to_values()).unwrap();
        assert!(parsed.settled);
        assert_eq!(parsed.response_err.unwrap().message, "boom");
        assert!(parsed.response_ack.is_none());
    }

    #[test]
    fn test_defaults_do_not_parse() {
        assert!(RfcEnvelope::from_values(&rfc_schema().defaults()).is_none());
    }
}
