//! Stable node identity: schema and hostname-derived ids.

use serde_json::Value;
use shared_bus::{RecordSnapshot, Schema, Values};
use shared_types::{schema_names::NODE_SCHEMA, IdentityError, NodeIdentity};
use sysinfo::System;

/// Used when the host name cannot be read.
const FALLBACK_ID: &str = "node";

/// Declaration of the `node` record.
pub fn node_schema() -> Schema {
    Schema::new(NODE_SCHEMA)
        .field("nodeId", Value::Null)
        .field("id", Value::Null)
        .field("runtime", Value::String("node".into()))
        .field("role", Value::Null)
}

/// Reduce an arbitrary label to `[a-z0-9-]`, collapsing separators.
pub fn sanitize_id(raw: &str) -> Result<String, IdentityError> {
    let mut id = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            id.push(c.to_ascii_lowercase());
        } else if !id.ends_with('-') {
            id.push('-');
        }
    }
    let id = id.trim_matches('-').to_string();
    if id.is_empty() {
        Err(IdentityError::InvalidId(raw.to_string()))
    } else {
        Ok(id)
    }
}

/// Stable id of this machine, derived from its host name.
pub fn hostname_id() -> String {
    System::host_name()
        .and_then(|name| sanitize_id(&name).ok())
        .unwrap_or_else(|| FALLBACK_ID.to_string())
}

pub(crate) fn identity_values(identity: &NodeIdentity) -> Values {
    match serde_json::to_value(identity) {
        Ok(Value::Object(map)) => map,
        _ => Values::new(),
    }
}

pub(crate) fn identity_from_snapshot(snapshot: &RecordSnapshot) -> Option<NodeIdentity> {
    serde_json::from_value(Value::Object(snapshot.values.clone())).ok()
}
