//! Handle onto one replicated record.

use serde_json::Value;
use shared_types::{NodeId, RecordId};
use std::sync::Arc;

use crate::errors::StateError;
use crate::events::RecordEvent;
use crate::hub::StateHub;
use crate::schema::Schema;
use crate::subscriber::Subscription;
use crate::Values;

/// An owned or attached record.
///
/// Every node holding a handle may read, write and observe the record. Only
/// the owner may delete it.
#[derive(Clone)]
pub struct SharedRecord {
    hub: StateHub,
    node_id: NodeId,
    record_id: RecordId,
    schema: Arc<Schema>,
    owner: NodeId,
}

impl std::fmt::Debug for SharedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRecord")
            .field("schema", &self.schema.name())
            .field("record_id", &self.record_id)
            .field("owner", &self.owner)
            .field("node_id", &self.node_id)
            .finish()
    }
}

impl SharedRecord {
    pub(crate) fn new(
        hub: StateHub,
        node_id: NodeId,
        record_id: RecordId,
        schema: Arc<Schema>,
        owner: NodeId,
    ) -> Self {
        Self {
            hub,
            node_id,
            record_id,
            schema,
            owner,
        }
    }

    #[must_use]
    pub fn id(&self) -> RecordId {
        self.record_id
    }

    #[must_use]
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// Whether the local node created this record.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.owner == self.node_id
    }

    #[must_use]
    pub fn schema_name(&self) -> &str {
        self.schema.name()
    }

    /// Current value of a stored field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.hub
            .values(self.record_id)
            .and_then(|mut values| values.remove(key))
    }

    /// Current stored values; `None` once deleted.
    #[must_use]
    pub fn values(&self) -> Option<Values> {
        self.hub.values(self.record_id)
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.hub.values(self.record_id).is_some()
    }

    /// Write fields. Observers (including this node's) are notified before return.
    pub fn set(&self, updates: Values) -> Result<(), StateError> {
        self.hub.set(self.node_id, self.record_id, updates)
    }

    /// Write a single field.
    pub fn set_value(&self, key: &str, value: Value) -> Result<(), StateError> {
        let mut updates = Values::new();
        updates.insert(key.to_string(), value);
        self.set(updates)
    }

    /// Observe every later mutation of this record.
    pub fn subscribe(&self) -> Result<Subscription<RecordEvent>, StateError> {
        self.hub.subscribe_record(self.record_id)
    }

    /// Delete the record. Owner only.
    pub fn delete(&self) -> Result<(), StateError> {
        self.hub.delete(self.node_id, self.record_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StateHub;
    use serde_json::json;

    fn hub() -> StateHub {
        let hub = StateHub::new();
        hub.register_schema(
            Schema::new("thing")
                .field("state", json!("idle"))
                .event_field("tick"),
        )
        .unwrap();
        hub
    }

    #[tokio::test]
    async fn test_attached_view_shares_values() {
        let hub = hub();
        let a = hub.connect();
        let b = hub.connect();
        let owned = a.create("thing", Values::new()).await.unwrap();
        let attached = b.attach("thing", owned.id()).await.unwrap();

        assert!(owned.is_owner());
        assert!(!attached.is_owner());
        assert_eq!(attached.owner(), a.node_id());

        attached.set_value("state", json!("busy")).unwrap();
        assert_eq!(owned.get("state"), Some(json!("busy")));
    }

    #[tokio::test]
    async fn test_attached_cannot_delete() {
        let hub = hub();
        let a = hub.connect();
        let b = hub.connect();
        let owned = a.create("thing", Values::new()).await.unwrap();
        let attached = b.attach("thing", owned.id()).await.unwrap();

        assert!(matches!(attached.delete(), Err(StateError::NotOwner { .. })));
        owned.delete().unwrap();
        assert!(!attached.exists());
        assert_eq!(
            attached.set_value("state", json!("x")),
            Err(StateError::RecordDeleted(owned.id()))
        );
    }

    #[tokio::test]
    async fn test_subscriber_sees_event_fields() {
        let hub = hub();
        let a = hub.connect();
        let owned = a.create("thing", Values::new()).await.unwrap();
        let mut sub = owned.subscribe().unwrap();
        owned.set_value("tick", json!(42)).unwrap();

        match sub.recv().await {
            Some(RecordEvent::Updated { updates, .. }) => assert_eq!(updates["tick"], json!(42)),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(owned.get("tick"), None);
    }

    #[tokio::test]
    async fn test_attach_wrong_schema() {
        let hub = hub();
        hub.register_schema(Schema::new("other")).unwrap();
        let a = hub.connect();
        let owned = a.create("thing", Values::new()).await.unwrap();
        assert!(matches!(
            a.attach("other", owned.id()).await,
            Err(StateError::RecordNotFound { .. })
        ));
    }
}
