//! RFC handlers run on the node asked to own a source, and the resolver
//! hooks run on the node that asked.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_bus::Collection;
use shared_types::RecordId;
use sm_01_rfc_bus::{handler_fn, RemoteError, ResolverHook, RfcHandler, RfcHandlerError};
use sm_04_source_factory::{fields, SourceError, SourceFactory};
use std::sync::Arc;
use tracing::{debug, warn};

/// Call creating a source on the executing node.
pub const CREATE_SOURCE: &str = "create-source";

/// Call deleting a source owned by the executing node.
pub const DELETE_SOURCE: &str = "delete-source";

/// Acknowledgement of both calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAck {
    pub id: String,
    pub record_id: RecordId,
}

/// Payload of [`DELETE_SOURCE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub id: String,
}

fn relay(err: SourceError) -> RfcHandlerError {
    RfcHandlerError::new(err.kind(), err.to_string())
}

fn ack(ack: SourceAck) -> Result<Value, RfcHandlerError> {
    serde_json::to_value(ack).map_err(|e| RfcHandlerError::failed(e.to_string()))
}

pub fn create_handler(factory: Arc<SourceFactory>) -> Arc<dyn RfcHandler> {
    handler_fn(move |payload: Value| {
        let factory = factory.clone();
        async move {
            let record = factory.create(&payload).await.map_err(relay)?;
            let id = record
                .get(fields::ID)
                .and_then(|id| id.as_str().map(str::to_string))
                .unwrap_or_default();
            ack(SourceAck {
                id,
                record_id: record.id(),
            })
        }
    })
}

pub fn delete_handler(factory: Arc<SourceFactory>) -> Arc<dyn RfcHandler> {
    handler_fn(move |payload: Value| {
        let factory = factory.clone();
        async move {
            let request: DeleteRequest = serde_json::from_value(payload).map_err(|e| {
                relay(SourceError::InvalidConfig {
                    id: String::new(),
                    reason: format!("delete request: {e}"),
                })
            })?;
            let record_id = factory
                .get(&request.id)
                .map(|record| record.id())
                .ok_or_else(|| relay(SourceError::NotFound(request.id.clone())))?;
            factory.delete(&request.id).map_err(relay)?;
            ack(SourceAck {
                id: request.id,
                record_id,
            })
        }
    })
}

/// Waits until the acknowledged record is present in the local replica, or
/// released by its owner before this node saw it.
pub struct AwaitPresent {
    pub sources: Arc<Collection>,
}

/// Waits until the acknowledged record is gone from the local replica.
pub struct AwaitAbsent {
    pub sources: Arc<Collection>,
}

fn acknowledged(err: Option<&RemoteError>, ack: Option<&Value>) -> Option<SourceAck> {
    if err.is_some() {
        return None;
    }
    let ack = ack.cloned()?;
    match serde_json::from_value(ack) {
        Ok(ack) => Some(ack),
        Err(e) => {
            warn!(error = %e, "[sm-05] Unexpected source acknowledgement");
            None
        }
    }
}

#[async_trait]
impl ResolverHook for AwaitPresent {
    async fn resolve(&self, err: Option<&RemoteError>, ack: Option<&Value>) {
        let Some(ack) = acknowledged(err, ack) else {
            return;
        };
        match self.sources.wait_for_record(ack.record_id).await {
            Ok(Some(_)) => debug!(source_id = %ack.id, "[sm-05] Created source visible"),
            Ok(None) => warn!(source_id = %ack.id, "[sm-05] Created source already released"),
            Err(e) => warn!(source_id = %ack.id, error = %e, "[sm-05] Created source never seen"),
        }
    }
}

#[async_trait]
impl ResolverHook for AwaitAbsent {
    async fn resolve(&self, err: Option<&RemoteError>, ack: Option<&Value>) {
        let Some(ack) = acknowledged(err, ack) else {
            return;
        };
        match self
            .sources
            .wait_until_absent(|snapshot| snapshot.record_id == ack.record_id)
            .await
        {
            Ok(()) => debug!(source_id = %ack.id, "[sm-05] Deleted source gone"),
            Err(e) => warn!(source_id = %ack.id, error = %e, "[sm-05] Deleted source still visible"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_bus::{StateHub, Values};
    use shared_types::schema_names::SOURCE_SCHEMA;
    use sm_04_source_factory::source_schema;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(1);

    async fn present_hook(hub: &StateHub) -> AwaitPresent {
        let caller = hub.connect();
        AwaitPresent {
            sources: Arc::new(caller.get_collection(SOURCE_SCHEMA).await.unwrap()),
        }
    }

    #[tokio::test]
    async fn test_await_present_sees_created_record() {
        let hub = StateHub::new();
        hub.register_schema(source_schema()).unwrap();
        let hook = present_hook(&hub).await;
        let owner = hub.connect();
        let record = owner.create(SOURCE_SCHEMA, Values::new()).await.unwrap();

        let ack = json!({"id": "s", "recordId": record.id()});
        timeout(WAIT, hook.resolve(None, Some(&ack))).await.unwrap();
        assert!(hook.sources.get(record.id()).is_some());
    }

    #[tokio::test]
    async fn test_await_present_ends_when_owner_leaves() {
        let hub = StateHub::new();
        hub.register_schema(source_schema()).unwrap();
        let hook = present_hook(&hub).await;
        let owner = hub.connect();
        let record = owner.create(SOURCE_SCHEMA, Values::new()).await.unwrap();
        owner.disconnect();

        let ack = json!({"id": "s", "recordId": record.id()});
        timeout(WAIT, hook.resolve(None, Some(&ack))).await.unwrap();
    }

    #[tokio::test]
    async fn test_hooks_skip_failed_calls() {
        let hub = StateHub::new();
        hub.register_schema(source_schema()).unwrap();
        let hook = present_hook(&hub).await;
        let err = RemoteError::new("NotFound", "gone");
        let ack = json!({"id": "s", "recordId": 999});
        timeout(WAIT, hook.resolve(Some(&err), Some(&ack))).await.unwrap();
    }
}
