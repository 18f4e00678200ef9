//! Per-node handle onto the hub.

use shared_types::{NodeId, RecordId};
use tracing::debug;

use crate::collection::Collection;
use crate::errors::StateError;
use crate::events::RecordSnapshot;
use crate::hub::StateHub;
use crate::record::SharedRecord;
use crate::schema::Schema;
use crate::Values;

/// One node's connection to the replicated state.
#[derive(Clone)]
pub struct StateClient {
    hub: StateHub,
    node_id: NodeId,
}

impl std::fmt::Debug for StateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateClient")
            .field("node_id", &self.node_id)
            .finish()
    }
}

impl StateClient {
    pub(crate) fn new(hub: StateHub, node_id: NodeId) -> Self {
        Self { hub, node_id }
    }

    /// Ephemeral id assigned by the hub at connection.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// The hub this client is connected to.
    #[must_use]
    pub fn hub(&self) -> &StateHub {
        &self.hub
    }

    /// Declare a schema. See [`StateHub::register_schema`].
    pub fn register_schema(&self, schema: Schema) -> Result<(), StateError> {
        self.hub.register_schema(schema)
    }

    /// Create a record owned by this node.
    pub async fn create(&self, schema: &str, init: Values) -> Result<SharedRecord, StateError> {
        let (record_id, schema) = self.hub.create_record(self.node_id, schema, &init)?;
        Ok(SharedRecord::new(
            self.hub.clone(),
            self.node_id,
            record_id,
            schema,
            self.node_id,
        ))
    }

    /// Attach to an existing record created by any node.
    pub async fn attach(&self, schema: &str, record_id: RecordId) -> Result<SharedRecord, StateError> {
        let (owner, schema) = self.hub.attach_record(schema, record_id)?;
        debug!(node_id = self.node_id, record_id, owner, "Record attached");
        Ok(SharedRecord::new(
            self.hub.clone(),
            self.node_id,
            record_id,
            schema,
            owner,
        ))
    }

    /// Open a live local replica of every record of `schema`.
    pub async fn get_collection(&self, schema: &str) -> Result<Collection, StateError> {
        let declared = self.hub.schema(schema)?;
        let (snapshot, subscription) = self.hub.subscribe_collection(schema)?;
        Ok(Collection::spawn(
            self.hub.clone(),
            declared,
            snapshot,
            subscription,
        ))
    }

    /// Authoritative point-in-time view of a schema, read straight from the hub.
    pub fn snapshot(&self, schema: &str) -> Result<Vec<RecordSnapshot>, StateError> {
        self.hub.snapshot(schema)
    }

    /// Whether this node is still connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.hub.is_connected(self.node_id)
    }

    /// Disconnect this node; its owned records are deleted.
    pub fn disconnect(&self) -> usize {
        self.hub.disconnect(self.node_id)
    }
}
