//! # Source Factory
//!
//! Per-process owner of live sources.
//!
//! ## Creation
//!
//! 1. The id is reserved locally and checked against every visible source.
//! 2. Transports are acquired and inputs resolved. Nothing is written yet,
//!    so a failure here leaves no record behind.
//! 3. The `source` record is created with the initial values of its type.
//! 4. The source is spawned. If that fails the record is deleted again.
//!
//! ## Deletion
//!
//! Timers and tasks are cancelled before the record is released, so no
//! write reaches a deleted record.

use parking_lot::Mutex;
use serde_json::{json, Value};
use shared_bus::{Collection, RecordSnapshot, SharedRecord, StateClient, StateError};
use shared_types::{schema_names::SOURCE_SCHEMA, RecordId, SystemTimeSource, TimeSource};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::adapters::TransportRegistry;
use crate::domain::{fields, initial_values, source_schema, Result, SourceConfig, SourceError};
use crate::metrics;
use crate::ports::FrameRecorder;
use crate::sources::{
    AggregatedSource, ComoteSource, OscBridgeSource, RiotSource, SourceCore, SourceInstance,
    StreamPlayerSource,
};
use crate::timing::{Scheduler, DEFAULT_LOOKAHEAD, DEFAULT_TIMEOUT};

/// Timing knobs of a factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactoryOptions {
    /// Watchdog timeout of sources that do not configure their own.
    pub watchdog_timeout: Duration,
    /// Scheduler lookahead of stream players.
    pub lookahead: Duration,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            watchdog_timeout: DEFAULT_TIMEOUT,
            lookahead: DEFAULT_LOOKAHEAD,
        }
    }
}

pub struct SourceFactory {
    client: StateClient,
    is_server: bool,
    options: FactoryOptions,
    sources: Arc<Collection>,
    transports: Arc<TransportRegistry>,
    scheduler: Arc<Scheduler>,
    recorder: Arc<dyn FrameRecorder>,
    clock: Arc<dyn TimeSource>,
    instances: Mutex<HashMap<String, SourceInstance>>,
    reserved: Mutex<HashSet<String>>,
}

impl SourceFactory {
    /// Factory of the node behind `client`. Only the server node may create
    /// aggregates.
    pub async fn new(
        client: StateClient,
        is_server: bool,
        options: FactoryOptions,
        transports: Arc<TransportRegistry>,
        recorder: Arc<dyn FrameRecorder>,
    ) -> Result<Self> {
        client.register_schema(source_schema())?;
        let sources = Arc::new(client.get_collection(SOURCE_SCHEMA).await?);
        Ok(Self {
            client,
            is_server,
            options,
            sources,
            transports,
            scheduler: Arc::new(Scheduler::new(options.lookahead)),
            recorder,
            clock: Arc::new(SystemTimeSource),
            instances: Mutex::new(HashMap::new()),
            reserved: Mutex::new(HashSet::new()),
        })
    }

    /// Replace the wall clock used to stamp frames.
    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn client(&self) -> &StateClient {
        &self.client
    }

    pub fn is_server(&self) -> bool {
        self.is_server
    }

    pub fn options(&self) -> FactoryOptions {
        self.options
    }

    /// Local replica of every source record.
    pub fn sources(&self) -> &Arc<Collection> {
        &self.sources
    }

    pub fn transports(&self) -> &Arc<TransportRegistry> {
        &self.transports
    }

    /// Create a source from its JSON configuration.
    pub async fn create(&self, config: &Value) -> Result<SharedRecord> {
        self.create_from(SourceConfig::from_value(config)?).await
    }

    /// Create a source from a validated configuration.
    pub async fn create_from(&self, config: SourceConfig) -> Result<SharedRecord> {
        config.validate()?;
        let id = config.id().to_string();
        let _reservation = self.reserve(&id)?;
        if self.latest(&id)?.is_some() {
            return Err(SourceError::DuplicateId(id));
        }

        let instance = self.launch(&config).await?;
        let record = instance.core().record().clone();
        let live = {
            let mut instances = self.instances.lock();
            instances.insert(id.clone(), instance);
            instances.len()
        };
        metrics::set_live_sources(live);
        info!(
            source_id = %id,
            source_type = %config.source_type(),
            record_id = record.id(),
            "[sm-04] Source created"
        );
        Ok(record)
    }

    /// Delete a source owned by this node.
    pub fn delete(&self, id: &str) -> Result<()> {
        let (instance, live) = {
            let mut instances = self.instances.lock();
            let instance = instances
                .remove(id)
                .ok_or_else(|| SourceError::NotFound(id.to_string()))?;
            (instance, instances.len())
        };
        instance.close();
        metrics::set_live_sources(live);
        match instance.core().record().delete() {
            Ok(()) | Err(StateError::RecordDeleted(_)) => {}
            Err(e) => return Err(e.into()),
        }
        info!(source_id = %id, "[sm-04] Source deleted");
        Ok(())
    }

    /// Owned record of a local source.
    pub fn get(&self, id: &str) -> Option<SharedRecord> {
        self.instances
            .lock()
            .get(id)
            .map(|instance| instance.core().record().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.instances.lock().contains_key(id)
    }

    /// Ids of the local sources.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.instances.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete every local source, then close the transports.
    pub async fn shutdown(&self) {
        let instances: Vec<SourceInstance> = self
            .instances
            .lock()
            .drain()
            .map(|(_, instance)| instance)
            .collect();
        for instance in &instances {
            instance.close();
            if let Err(e) = instance.core().record().delete() {
                warn!(source_id = %instance.id(), error = %e, "[sm-04] Source record not released");
            }
        }
        metrics::set_live_sources(0);
        self.scheduler.shutdown();
        self.transports.shutdown().await;
        info!(sources = instances.len(), "[sm-04] Source factory stopped");
    }

    fn reserve(&self, id: &str) -> Result<Reservation<'_>> {
        let mut reserved = self.reserved.lock();
        if self.instances.lock().contains_key(id) || !reserved.insert(id.to_string()) {
            return Err(SourceError::DuplicateId(id.to_string()));
        }
        Ok(Reservation {
            reserved: &self.reserved,
            id: id.to_string(),
        })
    }

    /// Newest visible record carrying `id`, from the authoritative view.
    fn latest(&self, id: &str) -> Result<Option<RecordSnapshot>> {
        Ok(self
            .client
            .snapshot(SOURCE_SCHEMA)?
            .into_iter()
            .filter(|snapshot| snapshot.get_str(fields::ID) == Some(id))
            .max_by_key(|snapshot| snapshot.record_id))
    }

    /// Input `source` of the source being created as `owner`.
    fn resolve(&self, owner: &str, source: &str) -> Result<RecordSnapshot> {
        self.latest(source)?
            .ok_or_else(|| SourceError::config(owner, format!("unknown source {source:?}")))
    }

    fn timeout(&self, configured: Option<u64>) -> Duration {
        configured
            .map(Duration::from_millis)
            .unwrap_or(self.options.watchdog_timeout)
    }

    async fn launch(&self, config: &SourceConfig) -> Result<SourceInstance> {
        match config {
            SourceConfig::Riot(riot) => {
                let listener = self.transports.udp_listener(riot.port).await?;
                let core = self.create_core(config, json!({ "port": listener.port() })).await?;
                spawned(core, |core| {
                    let timeout = self.timeout(riot.timeout_ms);
                    RiotSource::spawn(core, riot, &listener, timeout, self.clock.clone())
                        .map(SourceInstance::Riot)
                })
            }
            SourceConfig::Comote(comote) => {
                let server = self.transports.ws_server(comote.port).await?;
                let core = self.create_core(config, json!({ "port": server.port() })).await?;
                spawned(core, |core| {
                    ComoteSource::spawn(core, &server, self.timeout(comote.timeout_ms))
                        .map(SourceInstance::Comote)
                })
            }
            SourceConfig::Aggregated(aggregated) => {
                if !self.is_server {
                    return Err(SourceError::PermissionDenied {
                        id: aggregated.id.clone(),
                        reason: "aggregates can only be created on the server node".into(),
                    });
                }
                // subscribe first so no input frame falls between lookup and spawn
                let events = self.sources.subscribe();
                let inputs = aggregated
                    .sources
                    .iter()
                    .map(|source| self.resolve(&aggregated.id, source).map(|input| input.record_id))
                    .collect::<Result<Vec<RecordId>>>()?;
                let core = self.create_core(config, config.static_infos()).await?;
                spawned(core, |core| {
                    AggregatedSource::spawn(core, inputs, events, self.options.watchdog_timeout)
                        .map(SourceInstance::Aggregated)
                })
            }
            SourceConfig::OscBridge(bridge) => {
                let events = self.sources.subscribe();
                let input = self.resolve(&bridge.id, &bridge.source)?;
                let input_active = input
                    .get(fields::ACTIVE)
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let client = self.transports.osc_client(&bridge.destination).await?;
                let core = self.create_core(config, config.static_infos()).await?;
                spawned(core, |core| {
                    OscBridgeSource::spawn(
                        core,
                        input.record_id,
                        input_active,
                        events,
                        client,
                        bridge.variant,
                    )
                    .map(SourceInstance::OscBridge)
                })
            }
            SourceConfig::StreamPlayer(player) => {
                let core = self.create_core(config, config.static_infos()).await?;
                spawned(core, |core| {
                    StreamPlayerSource::spawn(
                        core,
                        player,
                        self.scheduler.clone(),
                        self.clock.clone(),
                    )
                    .map(SourceInstance::StreamPlayer)
                })
            }
        }
    }

    async fn create_core(&self, config: &SourceConfig, infos: Value) -> Result<Arc<SourceCore>> {
        let values = initial_values(config, self.client.node_id(), infos);
        let record = self.client.create(SOURCE_SCHEMA, values).await?;
        Ok(SourceCore::new(
            config.id(),
            config.source_type(),
            record,
            self.recorder.clone(),
        ))
    }
}

/// Run `spawn`, releasing the record if the source never comes up.
fn spawned<F>(core: Arc<SourceCore>, spawn: F) -> Result<SourceInstance>
where
    F: FnOnce(Arc<SourceCore>) -> Result<SourceInstance>,
{
    spawn(core.clone()).inspect_err(|e| {
        warn!(source_id = %core.id(), error = %e, "[sm-04] Source failed to start");
        core.close();
        if let Err(e) = core.record().delete() {
            warn!(source_id = %core.id(), error = %e, "[sm-04] Source record not released");
        }
    })
}

/// Holds an id between the duplicate check and registration.
struct Reservation<'a> {
    reserved: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.reserved.lock().remove(&self.id);
    }
}
