//! Replicated state errors.

use shared_types::{NodeId, RecordId};
use thiserror::Error;

/// Errors from the replicated state layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// No schema with this name was declared.
    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    /// A schema with this name was already declared with different fields.
    #[error("Schema {0} already declared with a different layout")]
    SchemaConflict(String),

    /// A write or initial value names a field the schema does not declare.
    #[error("Unknown field {field:?} for schema {schema}")]
    UnknownField { schema: String, field: String },

    /// Attach target does not exist.
    #[error("Record {record_id} not found in schema {schema}")]
    RecordNotFound { schema: String, record_id: RecordId },

    /// The record was deleted.
    #[error("Record {0} was deleted")]
    RecordDeleted(RecordId),

    /// Only the owning node may delete a record.
    #[error("Node {node_id} does not own record {record_id}")]
    NotOwner { record_id: RecordId, node_id: NodeId },

    /// The node is no longer connected to the hub.
    #[error("Node {0} is disconnected")]
    Disconnected(NodeId),

    /// The local replica of a collection stopped receiving updates.
    #[error("Collection {0} closed")]
    CollectionClosed(String),
}
