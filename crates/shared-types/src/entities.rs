//! # Core Entities
//!
//! Node identity as replicated in the `node` record, plus the id aliases the
//! replicated-state layer hands out.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::IdentityError;

/// Ephemeral id assigned by the transport layer, unique per live connection.
pub type NodeId = u32;

/// Id of one replicated record, unique for the lifetime of the process group.
pub type RecordId = u64;

/// Topological id reserved for the single authoritative node.
pub const SERVER_ID: &str = "server";

/// Where a node process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    /// Native process.
    #[default]
    Node,
    /// Browser tab.
    Browser,
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Runtime::Node => write!(f, "node"),
            Runtime::Browser => write!(f, "browser"),
        }
    }
}

impl FromStr for Runtime {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(Runtime::Node),
            "browser" => Ok(Runtime::Browser),
            other => Err(IdentityError::UnknownRuntime(other.to_string())),
        }
    }
}

/// Identity of one participating process.
///
/// Created once at process start and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeIdentity {
    /// Ephemeral transport id.
    pub node_id: NodeId,
    /// Stable topological id (`"server"` or hostname-derived).
    pub id: String,
    /// Where the process runs.
    pub runtime: Runtime,
    /// Deployment role label.
    pub role: String,
}

impl NodeIdentity {
    /// Whether this is the single authoritative node.
    #[must_use]
    pub fn is_server(&self) -> bool {
        self.id == SERVER_ID
    }
}

/// A logical address for a node: either its ephemeral id or its stable id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeAddress {
    /// Resolve to the local node.
    Local,
    /// Ephemeral transport id.
    NodeId(NodeId),
    /// Stable topological id, e.g. `"server"`.
    Topological(String),
}

impl From<NodeId> for NodeAddress {
    fn from(node_id: NodeId) -> Self {
        NodeAddress::NodeId(node_id)
    }
}

impl From<&str> for NodeAddress {
    fn from(id: &str) -> Self {
        NodeAddress::Topological(id.to_string())
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeAddress::Local => write!(f, "local"),
            NodeAddress::NodeId(id) => write!(f, "node#{}", id),
            NodeAddress::Topological(id) => write!(f, "{}", id),
        }
    }
}
