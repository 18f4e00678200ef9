//! JSON datagrams from WebSocket devices.

use serde_json::Value;

use crate::errors::{ProtocolError, Result};
use crate::frame::SensorFrame;

/// Device family speaking JSON over WebSocket.
pub const COMOTE_SOURCE: &str = "comote";

/// Parse a WebSocket datagram into a frame. Only `comote` frames are accepted.
pub fn parse_json_frame(value: &Value) -> Result<SensorFrame> {
    let source = value.get("source").and_then(Value::as_str).unwrap_or_default();
    if source != COMOTE_SOURCE {
        return Err(ProtocolError::WrongSource {
            expected: COMOTE_SOURCE.to_string(),
            got: source.to_string(),
        });
    }
    // ids are sometimes sent as numbers
    let mut value = value.clone();
    if let Some(id) = value.get("id").and_then(Value::as_u64) {
        value["id"] = Value::String(id.to_string());
    }
    serde_json::from_value(value).map_err(|e| ProtocolError::Json(e.to_string()))
}

/// Parse a text WebSocket message.
pub fn parse_json_text(text: &str) -> Result<SensorFrame> {
    let value: Value = serde_json::from_str(text).map_err(|e| ProtocolError::Json(e.to_string()))?;
    parse_json_frame(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_comote() {
        let frame = parse_json_text(
            r#"{"source":"comote","id":"phone","api":"v3","timestamp":5.0,"frequency":60,
                "accelerometer":{"x":1,"y":2,"z":3}}"#,
        )
        .unwrap();
        assert_eq!(frame.id, "phone");
        assert_eq!(frame.frequency, 60.0);
        assert_eq!(frame.accelerometer.unwrap().z, 3.0);
    }

    #[test]
    fn test_numeric_id() {
        let frame = parse_json_frame(&json!({"source": "comote", "id": 7})).unwrap();
        assert_eq!(frame.id, "7");
    }

    #[test]
    fn test_rejects_other_sources() {
        assert_eq!(
            parse_json_frame(&json!({"source": "riot", "id": "0"})),
            Err(ProtocolError::WrongSource {
                expected: "comote".into(),
                got: "riot".into()
            })
        );
        assert!(matches!(
            parse_json_text("not json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            parse_json_frame(&json!({"source": "comote", "id": "x", "gyroscope": 4})),
            Err(ProtocolError::Json(_))
        ));
    }
}
