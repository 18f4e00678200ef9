//! RFC bus service: request path, handler path, dispatcher loop.

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shared_bus::{RecordEvent, SharedRecord, StateClient, Subscription, Values};
use shared_types::{schema_names::RFC_SCHEMA, NodeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::{
    rfc_schema, CommandId, Completion, PendingCallStore, RemoteError, Result, RfcEnvelope,
    RfcError, HANDLER_FAILED, HANDLER_MISSING,
};
use crate::metrics;
use crate::ports::{ResolverHook, RfcHandler};

struct BusInner {
    client: StateClient,
    record: SharedRecord,
    next_command_id: AtomicU64,
    pending: PendingCallStore,
    handlers: RwLock<HashMap<String, Arc<dyn RfcHandler>>>,
    hooks: RwLock<HashMap<String, Arc<dyn ResolverHook>>>,
    protocol_violations: AtomicU64,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

/// One node's endpoint on the shared RFC bus.
///
/// Cheap to clone; clones share the pending table and handler registry.
#[derive(Clone)]
pub struct RfcBus {
    inner: Arc<BusInner>,
}

impl RfcBus {
    /// Join the bus of the client's process group.
    ///
    /// The server node creates the bus record; other nodes wait for it to
    /// appear and attach.
    pub async fn start(client: StateClient, is_server: bool) -> Result<Self> {
        client.register_schema(rfc_schema())?;

        let record = if is_server {
            client.create(RFC_SCHEMA, Values::new()).await?
        } else {
            let collection = client.get_collection(RFC_SCHEMA).await?;
            let bus = collection.wait_for(|_| true).await?;
            client.attach(RFC_SCHEMA, bus.record_id).await?
        };
        let events = record.subscribe()?;

        let inner = Arc::new(BusInner {
            client,
            record,
            next_command_id: AtomicU64::new(0),
            pending: PendingCallStore::new(),
            handlers: RwLock::new(HashMap::new()),
            hooks: RwLock::new(HashMap::new()),
            protocol_violations: AtomicU64::new(0),
            dispatcher: Mutex::new(None),
        });
        let task = tokio::spawn(dispatch(inner.clone(), events));
        *inner.dispatcher.lock() = Some(task);

        info!(
            node_id = inner.client.node_id(),
            record_id = inner.record.id(),
            is_server,
            "[sm-01] Rfc bus started"
        );
        Ok(Self { inner })
    }

    /// Ephemeral id of the local node.
    pub fn node_id(&self) -> NodeId {
        self.inner.client.node_id()
    }

    /// Register the handler executed when this node is the target of `name`.
    ///
    /// One handler per name; a later registration replaces the earlier one.
    pub fn set_handler(&self, name: &str, handler: Arc<dyn RfcHandler>) {
        if self
            .inner
            .handlers
            .write()
            .insert(name.to_string(), handler)
            .is_some()
        {
            warn!(name, "[sm-01] Rfc handler replaced");
        }
    }

    /// Register the hook run on this node before a `name` call resolves.
    pub fn set_resolver_hook(&self, name: &str, hook: Arc<dyn ResolverHook>) {
        self.inner.hooks.write().insert(name.to_string(), hook);
    }

    /// Invoke `name` on `executor` and wait for its settled response.
    ///
    /// There is no built-in deadline; race the future against a timer to get one.
    pub async fn request<P>(&self, executor: NodeId, name: &str, payload: &P) -> Result<Value>
    where
        P: Serialize + ?Sized,
    {
        if name.is_empty() {
            return Err(RfcError::InvalidArgument {
                name: String::new(),
                reason: "call name is empty".into(),
            });
        }
        let payload = serde_json::to_value(payload).map_err(|e| RfcError::InvalidArgument {
            name: name.to_string(),
            reason: format!("payload is not serializable: {e}"),
        })?;
        if !self.inner.client.hub().is_connected(executor) {
            return Err(RfcError::InvalidArgument {
                name: name.to_string(),
                reason: format!("executor node {executor} is not connected"),
            });
        }

        let command_id = self.inner.next_command_id.fetch_add(1, Ordering::SeqCst) + 1;
        let receiver = self.inner.pending.register(command_id, name);
        let guard = PendingGuard {
            store: &self.inner.pending,
            command_id,
            armed: true,
        };

        let envelope = RfcEnvelope::request(name, self.node_id(), executor, command_id, payload);
        metrics::record_request(name);
        debug!(
            name,
            command_id,
            executor,
            source = self.node_id(),
            "[sm-01] Rfc request"
        );
        self.inner.record.set(envelope.to_values())?;

        let response = receiver.await.map_err(|_| RfcError::BusClosed {
            name: name.to_string(),
        })?;
        guard.disarm();

        let hook = self.inner.hooks.read().get(name).cloned();
        if let Some(hook) = hook {
            hook.resolve(response.err.as_ref(), response.ack.as_ref())
                .await;
        }

        match response.err {
            Some(err) => {
                metrics::record_failure(name, &err.kind);
                Err(RfcError::Remote {
                    name: name.to_string(),
                    kind: err.kind,
                    message: err.message,
                })
            }
            None => Ok(response.ack.unwrap_or(Value::Null)),
        }
    }

    /// [`request`](Self::request) with the acknowledgement decoded into `T`.
    pub async fn request_as<T, P>(&self, executor: NodeId, name: &str, payload: &P) -> Result<T>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let ack = self.request(executor, name, payload).await?;
        serde_json::from_value(ack).map_err(|e| RfcError::Serialization {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Settled envelopes for this node that had no pending caller.
    pub fn protocol_violations(&self) -> u64 {
        self.inner.protocol_violations.load(Ordering::Relaxed)
    }

    /// Calls issued by this node still awaiting settlement.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.pending_count()
    }

    pub fn pending(&self) -> &PendingCallStore {
        &self.inner.pending
    }

    /// Stop the dispatcher. Pending callers resolve with `BusClosed`.
    pub fn shutdown(&self) {
        if let Some(task) = self.inner.dispatcher.lock().take() {
            task.abort();
        }
        let dropped = self.inner.pending.clear();
        info!(
            node_id = self.node_id(),
            dropped, "[sm-01] Rfc bus stopped"
        );
    }
}

/// Cancels the pending entry if the caller's future is dropped mid-flight.
struct PendingGuard<'a> {
    store: &'a PendingCallStore,
    command_id: CommandId,
    armed: bool,
}

impl PendingGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.store.cancel(self.command_id);
        }
    }
}

async fn dispatch(inner: Arc<BusInner>, mut events: Subscription<RecordEvent>) {
    let me = inner.client.node_id();
    while let Some(event) = events.recv().await {
        let updates = match event {
            RecordEvent::Updated { updates, .. } => updates,
            RecordEvent::Deleted { .. } => {
                warn!(node_id = me, "[sm-01] Rfc bus record deleted");
                break;
            }
        };
        let Some(envelope) = RfcEnvelope::from_values(&updates) else {
            continue;
        };

        if !envelope.settled {
            if envelope.executor_node_id == me {
                tokio::spawn(execute(inner.clone(), envelope));
            }
        } else if envelope.source_node_id == me {
            settle(&inner, envelope);
        }
    }
    inner.pending.clear();
}

async fn execute(inner: Arc<BusInner>, envelope: RfcEnvelope) {
    let me = inner.client.node_id();
    let handler = inner.handlers.read().get(&envelope.name).cloned();

    let outcome = match handler {
        Some(handler) => {
            let payload = envelope.payload.clone();
            match tokio::spawn(async move { handler.handle(payload).await }).await {
                Ok(result) => result.map_err(RemoteError::from),
                Err(join) => {
                    error!(name = %envelope.name, command_id = envelope.command_id, "[sm-01] Rfc handler panicked: {join}");
                    Err(RemoteError::new(
                        HANDLER_FAILED,
                        format!("handler for {:?} on node {me} panicked", envelope.name),
                    ))
                }
            }
        }
        None => {
            warn!(
                name = %envelope.name,
                source = envelope.source_node_id,
                "[sm-01] No rfc handler registered"
            );
            Err(RemoteError::new(
                HANDLER_MISSING,
                format!("no handler registered for {:?} on node {me}", envelope.name),
            ))
        }
    };

    let name = envelope.name.clone();
    let command_id = envelope.command_id;
    if let Err(err) = inner.record.set(envelope.settle(outcome).to_values()) {
        warn!(name = %name, command_id, error = %err, "[sm-01] Failed to settle rfc");
    }
}

fn settle(inner: &BusInner, envelope: RfcEnvelope) {
    match inner
        .pending
        .complete(envelope.command_id, envelope.response_ack, envelope.response_err)
    {
        Completion::Delivered => {}
        Completion::CallerGone => {
            debug!(
                name = %envelope.name,
                command_id = envelope.command_id,
                "[sm-01] Late rfc settlement ignored"
            );
        }
        Completion::Unknown => {
            inner.protocol_violations.fetch_add(1, Ordering::Relaxed);
            metrics::record_protocol_violation();
            error!(
                name = %envelope.name,
                command_id = envelope.command_id,
                executor = envelope.executor_node_id,
                "[sm-01] Settled rfc has no pending caller"
            );
        }
    }
}
