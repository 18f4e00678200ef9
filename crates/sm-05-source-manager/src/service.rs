//! Source manager service.

use serde_json::Value;
use shared_bus::{Collection, RecordSnapshot};
use shared_types::{schema_names::SOURCE_SCHEMA, NodeId};
use sm_01_rfc_bus::RfcBus;
use sm_04_source_factory::{fields, SourceError, SourceFactory, SourceView};
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::Result;
use crate::handlers::{
    create_handler, delete_handler, AwaitAbsent, AwaitPresent, DeleteRequest, SourceAck,
    CREATE_SOURCE, DELETE_SOURCE,
};

/// Creates, finds and deletes sources on any node.
pub struct SourceManager {
    bus: RfcBus,
    factory: Arc<SourceFactory>,
}

impl SourceManager {
    /// Serve source calls for `factory` on `bus` and install the hooks that
    /// make this node's calls resolve only once their effect is visible.
    pub fn new(bus: RfcBus, factory: Arc<SourceFactory>) -> Self {
        let sources = factory.sources().clone();
        bus.set_handler(CREATE_SOURCE, create_handler(factory.clone()));
        bus.set_handler(DELETE_SOURCE, delete_handler(factory.clone()));
        bus.set_resolver_hook(
            CREATE_SOURCE,
            Arc::new(AwaitPresent {
                sources: sources.clone(),
            }),
        );
        bus.set_resolver_hook(DELETE_SOURCE, Arc::new(AwaitAbsent { sources }));
        info!(node_id = bus.node_id(), "[sm-05] Source manager ready");
        Self { bus, factory }
    }

    pub fn node_id(&self) -> NodeId {
        self.bus.node_id()
    }

    pub fn bus(&self) -> &RfcBus {
        &self.bus
    }

    pub fn factory(&self) -> &Arc<SourceFactory> {
        &self.factory
    }

    /// Live replica of every source record.
    pub fn sources(&self) -> &Arc<Collection> {
        self.factory.sources()
    }

    /// Every visible source.
    pub fn list(&self) -> Vec<RecordSnapshot> {
        self.sources().snapshot()
    }

    /// Create a source on `node` (this node if `None`).
    ///
    /// Resolves with the source id once the record is visible here.
    pub async fn create_source(&self, config: &Value, node: Option<NodeId>) -> Result<String> {
        if let Some(id) = config.get(fields::ID).and_then(Value::as_str) {
            if self.sources().find_by(fields::ID, id).is_some() {
                return Err(SourceError::DuplicateId(id.to_string()).into());
            }
        }
        let executor = node.unwrap_or_else(|| self.node_id());
        debug!(executor, "[sm-05] Requesting source creation");
        let ack: SourceAck = self.bus.request_as(executor, CREATE_SOURCE, config).await?;
        info!(source_id = %ack.id, executor, "[sm-05] Source created");
        Ok(ack.id)
    }

    /// Handle on source `id`: the owned record on its owner, an attached
    /// view elsewhere. `None` if no such source is visible.
    pub async fn get_source(&self, id: &str) -> Option<SourceView> {
        if let Some(record) = self.factory.get(id) {
            return SourceView::new(record);
        }
        let snapshot = self
            .sources()
            .snapshot()
            .into_iter()
            .filter(|snapshot| snapshot.get_str(fields::ID) == Some(id))
            .max_by_key(|snapshot| snapshot.record_id)?;
        let record = self
            .factory
            .client()
            .attach(SOURCE_SCHEMA, snapshot.record_id)
            .await
            .ok()?;
        SourceView::new(record)
    }

    /// Delete source `id` on its owner `node` (this node if `None`).
    ///
    /// Resolves once the record is gone here.
    pub async fn delete_source(&self, id: &str, node: Option<NodeId>) -> Result<()> {
        let executor = node.unwrap_or_else(|| self.node_id());
        let request = DeleteRequest { id: id.to_string() };
        let _: SourceAck = self.bus.request_as(executor, DELETE_SOURCE, &request).await?;
        info!(source_id = %id, executor, "[sm-05] Source deleted");
        Ok(())
    }

    /// Owner of the newest visible source `id`.
    pub fn owner_of(&self, id: &str) -> Option<NodeId> {
        self.sources()
            .find_by(fields::ID, id)
            .map(|snapshot| snapshot.owner)
    }
}
