//! Node registration and address resolution.

use shared_bus::{Collection, SharedRecord, StateClient};
use shared_types::{
    schema_names::NODE_SCHEMA, IdentityError, NodeAddress, NodeId, NodeIdentity, Runtime, SERVER_ID,
};
use tracing::info;

use crate::errors::{RegistryError, Result};
use crate::identity::{
    hostname_id, identity_from_snapshot, identity_values, node_schema, sanitize_id,
};

/// How the local node presents itself.
#[derive(Debug, Clone)]
pub struct NodeOptions {
    /// Register as the single authoritative node.
    pub is_server: bool,
    /// Override of the hostname-derived id (ignored for the server).
    pub id: Option<String>,
    pub runtime: Runtime,
    pub role: String,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            is_server: false,
            id: None,
            runtime: Runtime::Node,
            role: "default".to_string(),
        }
    }
}

/// The local node's identity record plus a live view of every node.
pub struct NodeRegistry {
    identity: NodeIdentity,
    record: SharedRecord,
    nodes: Collection,
}

impl NodeRegistry {
    /// Publish the local node's identity record.
    pub async fn register(client: &StateClient, options: NodeOptions) -> Result<Self> {
        client.register_schema(node_schema())?;

        let id = if options.is_server {
            SERVER_ID.to_string()
        } else {
            let id = match options.id {
                Some(id) => sanitize_id(&id)?,
                None => hostname_id(),
            };
            if id == SERVER_ID {
                return Err(RegistryError::ReservedId(id));
            }
            id
        };

        if options.is_server {
            let existing = client
                .snapshot(NODE_SCHEMA)?
                .into_iter()
                .find(|snapshot| snapshot.get_str("id") == Some(SERVER_ID));
            if let Some(existing) = existing {
                return Err(RegistryError::DuplicateServer(existing.owner));
            }
        }

        let identity = NodeIdentity {
            node_id: client.node_id(),
            id,
            runtime: options.runtime,
            role: options.role,
        };
        let record = client
            .create(NODE_SCHEMA, identity_values(&identity))
            .await?;
        let nodes = client.get_collection(NODE_SCHEMA).await?;

        info!(
            node_id = identity.node_id,
            id = %identity.id,
            runtime = %identity.runtime,
            role = %identity.role,
            "[sm-02] Node registered"
        );
        Ok(Self {
            identity,
            record,
            nodes,
        })
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn node_id(&self) -> NodeId {
        self.identity.node_id
    }

    pub fn is_server(&self) -> bool {
        self.identity.is_server()
    }

    /// Every live node, in registration order.
    pub fn nodes(&self) -> Vec<NodeIdentity> {
        self.nodes
            .snapshot()
            .iter()
            .filter_map(identity_from_snapshot)
            .collect()
    }

    /// Identity of a live node.
    pub fn get(&self, node_id: NodeId) -> Option<NodeIdentity> {
        self.nodes
            .find(|snapshot| snapshot.owner == node_id)
            .and_then(|snapshot| identity_from_snapshot(&snapshot))
    }

    /// The authoritative node, if connected.
    pub fn server(&self) -> Option<NodeIdentity> {
        self.nodes
            .find_by("id", SERVER_ID)
            .and_then(|snapshot| identity_from_snapshot(&snapshot))
    }

    /// Resolve a logical address to the ephemeral id of a live node.
    ///
    /// A topological id shared by several nodes resolves to the most recently
    /// registered one.
    pub fn resolve(&self, address: &NodeAddress) -> Option<NodeId> {
        match address {
            NodeAddress::Local => Some(self.node_id()),
            NodeAddress::NodeId(node_id) => self.get(*node_id).map(|identity| identity.node_id),
            NodeAddress::Topological(id) => self
                .nodes
                .find_by("id", id)
                .and_then(|snapshot| identity_from_snapshot(&snapshot))
                .map(|identity| identity.node_id),
        }
    }

    /// Wait until a node with topological id `id` is registered.
    pub async fn wait_for(&self, id: &str) -> Result<NodeIdentity> {
        let snapshot = self
            .nodes
            .wait_for(|snapshot| {
                snapshot.get_str("id") == Some(id) && identity_from_snapshot(snapshot).is_some()
            })
            .await?;
        identity_from_snapshot(&snapshot)
            .ok_or_else(|| RegistryError::Identity(IdentityError::InvalidId(id.to_string())))
    }

    /// Live view of the `node` collection.
    pub fn collection(&self) -> &Collection {
        &self.nodes
    }

    /// Remove the local identity record.
    pub fn deregister(&self) -> Result<()> {
        self.record.delete()?;
        info!(node_id = self.node_id(), "[sm-02] Node deregistered");
        Ok(())
    }
}
