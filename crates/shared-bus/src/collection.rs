//! # Collection
//!
//! Live local replica of every record of one schema.
//!
//! The replica is kept current by a background task fed from the hub's
//! collection fan-out. A version counter is bumped whenever the stored part of
//! the replica changes, which is what `wait_for` and `wait_until_absent`
//! block on. Event-only writes (such as sensor frames) are forwarded to
//! collection subscribers but do not bump the version.

use parking_lot::{Mutex, RwLock};
use shared_types::RecordId;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::trace;

use crate::errors::StateError;
use crate::events::{CollectionEvent, RecordSnapshot};
use crate::hub::StateHub;
use crate::schema::Schema;
use crate::subscriber::Subscription;

type Replica = Arc<RwLock<BTreeMap<RecordId, RecordSnapshot>>>;
type Listeners = Arc<Mutex<Vec<mpsc::UnboundedSender<CollectionEvent>>>>;

/// Local replica of a schema's records.
pub struct Collection {
    hub: StateHub,
    schema: Arc<Schema>,
    replica: Replica,
    listeners: Listeners,
    version: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("schema", &self.schema.name())
            .field("len", &self.len())
            .finish()
    }
}

impl Collection {
    pub(crate) fn spawn(
        hub: StateHub,
        schema: Arc<Schema>,
        snapshot: Vec<RecordSnapshot>,
        mut events: Subscription<CollectionEvent>,
    ) -> Self {
        let replica: Replica = Arc::new(RwLock::new(
            snapshot.into_iter().map(|s| (s.record_id, s)).collect(),
        ));
        let listeners: Listeners = Arc::new(Mutex::new(Vec::new()));
        let (version_tx, version) = watch::channel(0u64);

        let task = {
            let schema = schema.clone();
            let replica = replica.clone();
            let listeners = listeners.clone();
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    if apply(&schema, &replica, &event) {
                        version_tx.send_modify(|v| *v += 1);
                    }
                    listeners
                        .lock()
                        .retain(|tx| tx.send(event.clone()).is_ok());
                }
                trace!(schema = schema.name(), "Collection feed ended");
            })
        };

        Self {
            hub,
            schema,
            replica,
            listeners,
            version,
            task,
        }
    }

    /// Schema name.
    #[must_use]
    pub fn schema_name(&self) -> &str {
        self.schema.name()
    }

    /// Every record currently in the replica, in creation order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RecordSnapshot> {
        self.replica.read().values().cloned().collect()
    }

    #[must_use]
    pub fn get(&self, record_id: RecordId) -> Option<RecordSnapshot> {
        self.replica.read().get(&record_id).cloned()
    }

    /// Most recently created record matching `pred`.
    #[must_use]
    pub fn find<F>(&self, pred: F) -> Option<RecordSnapshot>
    where
        F: Fn(&RecordSnapshot) -> bool,
    {
        self.replica
            .read()
            .values()
            .rev()
            .find(|snapshot| pred(*snapshot))
            .cloned()
    }

    /// Most recently created record whose string field `key` equals `value`.
    #[must_use]
    pub fn find_by(&self, key: &str, value: &str) -> Option<RecordSnapshot> {
        self.find(|snapshot| snapshot.get_str(key) == Some(value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.replica.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.replica.read().is_empty()
    }

    /// Wait until a record matching `pred` is present in the replica.
    pub async fn wait_for<F>(&self, pred: F) -> Result<RecordSnapshot, StateError>
    where
        F: Fn(&RecordSnapshot) -> bool,
    {
        let mut version = self.version.clone();
        loop {
            version.borrow_and_update();
            if let Some(found) = self.find(&pred) {
                return Ok(found);
            }
            if version.changed().await.is_err() {
                return self
                    .find(&pred)
                    .ok_or_else(|| StateError::CollectionClosed(self.schema.name().to_string()));
            }
        }
    }

    /// Wait until record `record_id` is in the replica.
    ///
    /// Resolves with `None` if the hub no longer holds the record, e.g. when
    /// it was deleted before this replica observed its creation.
    pub async fn wait_for_record(
        &self,
        record_id: RecordId,
    ) -> Result<Option<RecordSnapshot>, StateError> {
        let mut version = self.version.clone();
        loop {
            version.borrow_and_update();
            if let Some(found) = self.get(record_id) {
                return Ok(Some(found));
            }
            if !self.hub.contains(record_id) {
                return Ok(None);
            }
            if version.changed().await.is_err() {
                return Err(StateError::CollectionClosed(self.schema.name().to_string()));
            }
        }
    }

    /// Wait until no record matching `pred` remains in the replica.
    pub async fn wait_until_absent<F>(&self, pred: F) -> Result<(), StateError>
    where
        F: Fn(&RecordSnapshot) -> bool,
    {
        let mut version = self.version.clone();
        loop {
            version.borrow_and_update();
            if self.find(&pred).is_none() {
                return Ok(());
            }
            if version.changed().await.is_err() {
                return Err(StateError::CollectionClosed(self.schema.name().to_string()));
            }
        }
    }

    /// Observe every event applied to the replica from now on.
    ///
    /// Events are delivered after the replica reflects them.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<CollectionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().push(tx);
        Subscription::new(rx)
    }
}

impl Drop for Collection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Apply one event to the replica. Returns whether stored state changed.
fn apply(schema: &Schema, replica: &Replica, event: &CollectionEvent) -> bool {
    let mut records = replica.write();
    match event {
        CollectionEvent::Created(snapshot) => {
            records.insert(snapshot.record_id, snapshot.clone());
            true
        }
        CollectionEvent::Updated { record_id, updates } => match records.get_mut(record_id) {
            Some(snapshot) => schema.merge_stored(&mut snapshot.values, updates),
            None => false,
        },
        CollectionEvent::Deleted { record_id } => records.remove(record_id).is_some(),
    }
}

#[cfg(test)]
mod tests {
    use crate::{Schema, StateHub, Values};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn hub() -> StateHub {
        let hub = StateHub::new();
        hub.register_schema(
            Schema::new("item")
                .field("name", Value::Null)
                .field("ready", json!(false))
                .event_field("data"),
        )
        .unwrap();
        hub
    }

    fn named(name: &str) -> Values {
        let mut values = Values::new();
        values.insert("name".into(), json!(name));
        values
    }

    #[tokio::test]
    async fn test_initial_snapshot() {
        let hub = hub();
        let a = hub.connect();
        a.create("item", named("one")).await.unwrap();
        let b = hub.connect();
        let collection = b.get_collection("item").await.unwrap();
        assert_eq!(collection.len(), 1);
        assert!(collection.find_by("name", "one").is_some());
    }

    #[tokio::test]
    async fn test_wait_for_remote_create() {
        let hub = hub();
        let a = hub.connect();
        let b = hub.connect();
        let collection = b.get_collection("item").await.unwrap();

        let creator = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            a.create("item", named("late")).await.unwrap()
        });

        let found = tokio::time::timeout(
            Duration::from_secs(1),
            collection.wait_for(|s| s.get_str("name") == Some("late")),
        )
        .await
        .unwrap()
        .unwrap();
        let created = creator.await.unwrap();
        assert_eq!(found.record_id, created.id());
    }

    #[tokio::test]
    async fn test_wait_for_field_value() {
        let hub = hub();
        let a = hub.connect();
        let record = a.create("item", named("x")).await.unwrap();
        let collection = a.get_collection("item").await.unwrap();

        record.set_value("ready", json!(true)).unwrap();
        let found = tokio::time::timeout(
            Duration::from_secs(1),
            collection.wait_for(|s| s.get("ready") == Some(&json!(true))),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(found.record_id, record.id());
    }

    #[tokio::test]
    async fn test_wait_until_absent_on_disconnect() {
        let hub = hub();
        let a = hub.connect();
        let b = hub.connect();
        a.create("item", named("gone")).await.unwrap();
        let collection = b.get_collection("item").await.unwrap();
        assert!(collection.find_by("name", "gone").is_some());

        a.disconnect();
        tokio::time::timeout(
            Duration::from_secs(1),
            collection.wait_until_absent(|s| s.get_str("name") == Some("gone")),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(collection.is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_record() {
        let hub = hub();
        let a = hub.connect();
        let b = hub.connect();
        let collection = b.get_collection("item").await.unwrap();

        let kept = a.create("item", named("kept")).await.unwrap();
        let found = tokio::time::timeout(
            Duration::from_secs(1),
            collection.wait_for_record(kept.id()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(found.map(|s| s.record_id), Some(kept.id()));

        // created and released before the replica catches up
        let brief = a.create("item", named("brief")).await.unwrap();
        a.disconnect();
        let found = tokio::time::timeout(
            Duration::from_secs(1),
            collection.wait_for_record(brief.id()),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_event_fields_forwarded_not_stored() {
        let hub = hub();
        let a = hub.connect();
        let record = a.create("item", named("s")).await.unwrap();
        let collection = a.get_collection("item").await.unwrap();
        let mut events = collection.subscribe();

        record.set_value("data", json!([1, 2, 3])).unwrap();
        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.record_id(), record.id());
        assert!(collection.get(record.id()).unwrap().get("data").is_none());
    }

    #[tokio::test]
    async fn test_find_prefers_latest() {
        let hub = hub();
        let a = hub.connect();
        a.create("item", named("dup")).await.unwrap();
        let second = a.create("item", named("dup")).await.unwrap();
        let collection = a.get_collection("item").await.unwrap();
        assert_eq!(
            collection.find_by("name", "dup").unwrap().record_id,
            second.id()
        );
    }
}
