//! # Record Events
//!
//! Everything an observer of a record or collection can see.

use serde_json::Value;
use shared_types::{NodeId, RecordId};

use crate::Values;

/// Point-in-time copy of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSnapshot {
    /// Record id.
    pub record_id: RecordId,
    /// Owning node.
    pub owner: NodeId,
    /// Stored values (event fields excluded).
    pub values: Values,
}

impl RecordSnapshot {
    /// Value of `key`, if stored.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String value of `key`, if stored and a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }
}

/// Mutation of one record, as seen by its observers.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordEvent {
    /// Fields written by one `set()` call, event fields included.
    Updated {
        /// Record id.
        record_id: RecordId,
        /// Written fields.
        updates: Values,
    },
    /// Record was deleted (explicitly or by owner disconnect).
    Deleted {
        /// Record id.
        record_id: RecordId,
    },
}

impl RecordEvent {
    /// Id of the record this event is about.
    #[must_use]
    pub fn record_id(&self) -> RecordId {
        match self {
            RecordEvent::Updated { record_id, .. } | RecordEvent::Deleted { record_id } => {
                *record_id
            }
        }
    }
}

/// Mutation of a collection, as seen by its observers.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionEvent {
    /// A record of the schema was created.
    Created(RecordSnapshot),
    /// A record of the schema was written.
    Updated {
        /// Record id.
        record_id: RecordId,
        /// Written fields, event fields included.
        updates: Values,
    },
    /// A record of the schema was deleted.
    Deleted {
        /// Record id.
        record_id: RecordId,
    },
}

impl CollectionEvent {
    /// Id of the record this event is about.
    #[must_use]
    pub fn record_id(&self) -> RecordId {
        match self {
            CollectionEvent::Created(snapshot) => snapshot.record_id,
            CollectionEvent::Updated { record_id, .. } | CollectionEvent::Deleted { record_id } => {
                *record_id
            }
        }
    }
}
