//! # State Hub
//!
//! In-process fan-out point shared by every node of a process group.
//!
//! The hub assigns ephemeral node ids, stores the current value of every
//! record, and relays each mutation to the record's observers and to the
//! observers of the record's schema collection. All fan-out happens while the
//! hub lock is held, which is what gives per-record total ordering.

use parking_lot::Mutex;
use shared_types::{NodeId, RecordId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::client::StateClient;
use crate::errors::StateError;
use crate::events::{CollectionEvent, RecordEvent, RecordSnapshot};
use crate::schema::Schema;
use crate::subscriber::Subscription;
use crate::Values;

struct RecordSlot {
    schema: Arc<Schema>,
    owner: NodeId,
    values: Values,
    watchers: Vec<mpsc::UnboundedSender<RecordEvent>>,
}

impl RecordSlot {
    fn snapshot(&self, record_id: RecordId) -> RecordSnapshot {
        RecordSnapshot {
            record_id,
            owner: self.owner,
            values: self.values.clone(),
        }
    }
}

#[derive(Default)]
struct HubInner {
    next_node_id: NodeId,
    next_record_id: RecordId,
    connected: HashSet<NodeId>,
    schemas: HashMap<String, Arc<Schema>>,
    records: BTreeMap<RecordId, RecordSlot>,
    collection_watchers: HashMap<String, Vec<mpsc::UnboundedSender<CollectionEvent>>>,
}

impl HubInner {
    fn schema(&self, name: &str) -> Result<Arc<Schema>, StateError> {
        self.schemas
            .get(name)
            .cloned()
            .ok_or_else(|| StateError::UnknownSchema(name.to_string()))
    }

    fn ensure_connected(&self, node_id: NodeId) -> Result<(), StateError> {
        if self.connected.contains(&node_id) {
            Ok(())
        } else {
            Err(StateError::Disconnected(node_id))
        }
    }

    fn notify_collection(&mut self, schema: &str, event: CollectionEvent) {
        if let Some(watchers) = self.collection_watchers.get_mut(schema) {
            watchers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    fn remove_record(&mut self, record_id: RecordId) -> bool {
        let Some(slot) = self.records.remove(&record_id) else {
            return false;
        };
        for tx in &slot.watchers {
            let _ = tx.send(RecordEvent::Deleted { record_id });
        }
        self.notify_collection(slot.schema.name(), CollectionEvent::Deleted { record_id });
        true
    }
}

/// Shared fan-out point of one process group.
///
/// Cheap to clone; every clone refers to the same hub.
#[derive(Clone, Default)]
pub struct StateHub {
    inner: Arc<Mutex<HubInner>>,
}

impl StateHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a schema.
    ///
    /// Declaring the same schema twice is a no-op; declaring a different
    /// layout under an existing name fails.
    pub fn register_schema(&self, schema: Schema) -> Result<(), StateError> {
        let mut inner = self.inner.lock();
        match inner.schemas.get(schema.name()) {
            Some(existing) if **existing == schema => Ok(()),
            Some(_) => Err(StateError::SchemaConflict(schema.name().to_string())),
            None => {
                debug!(schema = schema.name(), "Schema declared");
                inner
                    .schemas
                    .insert(schema.name().to_string(), Arc::new(schema));
                Ok(())
            }
        }
    }

    /// Connect a new node and hand out its ephemeral id.
    #[must_use]
    pub fn connect(&self) -> StateClient {
        let node_id = {
            let mut inner = self.inner.lock();
            inner.next_node_id += 1;
            let node_id = inner.next_node_id;
            inner.connected.insert(node_id);
            node_id
        };
        info!(node_id, "[shared-bus] Node connected");
        StateClient::new(self.clone(), node_id)
    }

    /// Disconnect a node, deleting every record it owns.
    ///
    /// Returns the number of records torn down.
    pub fn disconnect(&self, node_id: NodeId) -> usize {
        let mut inner = self.inner.lock();
        if !inner.connected.remove(&node_id) {
            return 0;
        }
        let owned: Vec<RecordId> = inner
            .records
            .iter()
            .filter(|(_, slot)| slot.owner == node_id)
            .map(|(id, _)| *id)
            .collect();
        for record_id in &owned {
            inner.remove_record(*record_id);
        }
        info!(
            node_id,
            records = owned.len(),
            "[shared-bus] Node disconnected"
        );
        owned.len()
    }

    /// Whether `node_id` is currently connected.
    #[must_use]
    pub fn is_connected(&self, node_id: NodeId) -> bool {
        self.inner.lock().connected.contains(&node_id)
    }

    pub(crate) fn schema(&self, name: &str) -> Result<Arc<Schema>, StateError> {
        self.inner.lock().schema(name)
    }

    pub(crate) fn create_record(
        &self,
        owner: NodeId,
        schema_name: &str,
        init: &Values,
    ) -> Result<(RecordId, Arc<Schema>), StateError> {
        let mut inner = self.inner.lock();
        inner.ensure_connected(owner)?;
        let schema = inner.schema(schema_name)?;
        schema.validate(init)?;

        let mut values = schema.defaults();
        schema.merge_stored(&mut values, init);

        inner.next_record_id += 1;
        let record_id = inner.next_record_id;
        let slot = RecordSlot {
            schema: schema.clone(),
            owner,
            values,
            watchers: Vec::new(),
        };
        let snapshot = slot.snapshot(record_id);
        inner.records.insert(record_id, slot);
        inner.notify_collection(schema_name, CollectionEvent::Created(snapshot));

        debug!(record_id, owner, schema = schema_name, "Record created");
        Ok((record_id, schema))
    }

    pub(crate) fn attach_record(
        &self,
        schema_name: &str,
        record_id: RecordId,
    ) -> Result<(NodeId, Arc<Schema>), StateError> {
        let inner = self.inner.lock();
        match inner.records.get(&record_id) {
            Some(slot) if slot.schema.name() == schema_name => Ok((slot.owner, slot.schema.clone())),
            _ => Err(StateError::RecordNotFound {
                schema: schema_name.to_string(),
                record_id,
            }),
        }
    }

    pub(crate) fn set(
        &self,
        writer: NodeId,
        record_id: RecordId,
        updates: Values,
    ) -> Result<(), StateError> {
        let mut inner = self.inner.lock();
        inner.ensure_connected(writer)?;
        let slot = inner
            .records
            .get_mut(&record_id)
            .ok_or(StateError::RecordDeleted(record_id))?;
        slot.schema.validate(&updates)?;
        let schema = slot.schema.clone();
        schema.merge_stored(&mut slot.values, &updates);

        let event = RecordEvent::Updated {
            record_id,
            updates: updates.clone(),
        };
        slot.watchers.retain(|tx| tx.send(event.clone()).is_ok());
        inner.notify_collection(
            schema.name(),
            CollectionEvent::Updated { record_id, updates },
        );
        Ok(())
    }

    pub(crate) fn contains(&self, record_id: RecordId) -> bool {
        self.inner.lock().records.contains_key(&record_id)
    }

    pub(crate) fn values(&self, record_id: RecordId) -> Option<Values> {
        self.inner
            .lock()
            .records
            .get(&record_id)
            .map(|slot| slot.values.clone())
    }

    pub(crate) fn delete(&self, requester: NodeId, record_id: RecordId) -> Result<(), StateError> {
        let mut inner = self.inner.lock();
        let owner = inner
            .records
            .get(&record_id)
            .map(|slot| slot.owner)
            .ok_or(StateError::RecordDeleted(record_id))?;
        if owner != requester {
            return Err(StateError::NotOwner {
                record_id,
                node_id: requester,
            });
        }
        inner.remove_record(record_id);
        debug!(record_id, owner, "Record deleted");
        Ok(())
    }

    pub(crate) fn subscribe_record(
        &self,
        record_id: RecordId,
    ) -> Result<Subscription<RecordEvent>, StateError> {
        let mut inner = self.inner.lock();
        let slot = inner
            .records
            .get_mut(&record_id)
            .ok_or(StateError::RecordDeleted(record_id))?;
        let (tx, rx) = mpsc::unbounded_channel();
        slot.watchers.push(tx);
        Ok(Subscription::new(rx))
    }

    /// Snapshot of a schema's records and a subscription starting right after it.
    pub(crate) fn subscribe_collection(
        &self,
        schema_name: &str,
    ) -> Result<(Vec<RecordSnapshot>, Subscription<CollectionEvent>), StateError> {
        let mut inner = self.inner.lock();
        inner.schema(schema_name)?;
        let snapshot = Self::snapshot_locked(&inner, schema_name);
        let (tx, rx) = mpsc::unbounded_channel();
        inner
            .collection_watchers
            .entry(schema_name.to_string())
            .or_default()
            .push(tx);
        Ok((snapshot, Subscription::new(rx)))
    }

    pub(crate) fn snapshot(&self, schema_name: &str) -> Result<Vec<RecordSnapshot>, StateError> {
        let inner = self.inner.lock();
        inner.schema(schema_name)?;
        Ok(Self::snapshot_locked(&inner, schema_name))
    }

    fn snapshot_locked(inner: &HubInner, schema_name: &str) -> Vec<RecordSnapshot> {
        inner
            .records
            .iter()
            .filter(|(_, slot)| slot.schema.name() == schema_name)
            .map(|(id, slot)| slot.snapshot(*id))
            .collect()
    }
}
