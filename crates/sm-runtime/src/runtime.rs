//! # Node Runtime
//!
//! ## Startup Sequence
//!
//! 1. Validate configuration
//! 2. Connect to the state hub and publish the node identity
//! 3. Join the RFC bus (clients wait for the server's bus record)
//! 4. Start the source factory and serve source calls
//! 5. Spawn the gauge monitor
//!
//! Shutdown runs the same steps backwards.

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use shared_bus::{StateClient, StateHub};
use shared_types::{NodeAddress, NodeId, NodeIdentity};
use sm_01_rfc_bus::RfcBus;
use sm_02_node_registry::{NodeOptions, NodeRegistry};
use sm_04_source_factory::{FrameRecorder, NoopRecorder, SourceFactory, TransportRegistry};
use sm_05_source_manager::SourceManager;
use sm_telemetry::metrics::{NODES_CONNECTED, NODE_UPTIME, RFC_PENDING};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::NodeConfig;

/// Interval of the gauge monitor.
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// All subsystems of one process.
pub struct NodeRuntime {
    config: NodeConfig,
    client: StateClient,
    registry: Arc<NodeRegistry>,
    manager: SourceManager,
    started: Instant,
    monitor: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl NodeRuntime {
    /// Start a node on `hub` that records nothing.
    pub async fn start(hub: &StateHub, config: NodeConfig) -> Result<Self> {
        Self::start_with_recorder(hub, config, Arc::new(NoopRecorder)).await
    }

    /// Start a node on `hub` whose sources record through `recorder`.
    pub async fn start_with_recorder(
        hub: &StateHub,
        config: NodeConfig,
        recorder: Arc<dyn FrameRecorder>,
    ) -> Result<Self> {
        Self::wire(hub, config, recorder).await.inspect_err(|e| {
            sm_telemetry::record_error("sm-runtime", "StartFailed");
            error!(error = %e, "[sm-runtime] Node failed to start");
        })
    }

    async fn wire(
        hub: &StateHub,
        config: NodeConfig,
        recorder: Arc<dyn FrameRecorder>,
    ) -> Result<Self> {
        config.validate().context("invalid node configuration")?;

        let client = hub.connect();
        let registry = NodeRegistry::register(
            &client,
            NodeOptions {
                is_server: config.is_server,
                id: config.node_id.clone(),
                runtime: config.runtime,
                role: config.role.clone(),
            },
        )
        .await
        .context("node registration failed")?;
        let registry = Arc::new(registry);

        let bus = RfcBus::start(client.clone(), config.is_server)
            .await
            .context("rfc bus failed to start")?;

        let transports = Arc::new(TransportRegistry::new(config.bind_address));
        let factory = SourceFactory::new(
            client.clone(),
            config.is_server,
            config.factory_options(),
            transports,
            recorder,
        )
        .await
        .context("source factory failed to start")?;
        let manager = SourceManager::new(bus, Arc::new(factory));

        let started = Instant::now();
        let monitor = tokio::spawn(monitor(registry.clone(), manager.bus().clone(), started));

        info!(
            node_id = registry.node_id(),
            id = %registry.identity().id,
            role = %config.role,
            is_server = config.is_server,
            "[sm-runtime] Node started"
        );

        Ok(Self {
            config,
            client,
            registry,
            manager,
            started,
            monitor: Mutex::new(Some(monitor)),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn client(&self) -> &StateClient {
        &self.client
    }

    pub fn node_id(&self) -> NodeId {
        self.registry.node_id()
    }

    pub fn identity(&self) -> &NodeIdentity {
        self.registry.identity()
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn bus(&self) -> &RfcBus {
        self.manager.bus()
    }

    pub fn factory(&self) -> &Arc<SourceFactory> {
        self.manager.factory()
    }

    pub fn manager(&self) -> &SourceManager {
        &self.manager
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Ephemeral id of the live node at `address`.
    pub fn locate(&self, address: &NodeAddress) -> Result<NodeId> {
        self.registry
            .resolve(address)
            .ok_or_else(|| anyhow!("no live node at {address:?}"))
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }

    /// Stop every subsystem and leave the hub. Later calls do nothing.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self.monitor.lock().take() {
            task.abort();
        }
        self.manager.factory().shutdown().await;
        self.manager.bus().shutdown();
        if let Err(e) = self.registry.deregister() {
            warn!(error = %e, "[sm-runtime] Identity record not released");
        }
        let released = self.client.disconnect();
        info!(
            node_id = self.node_id(),
            released,
            uptime_ms = self.uptime().as_millis() as u64,
            "[sm-runtime] Node stopped"
        );
    }
}

async fn monitor(registry: Arc<NodeRegistry>, bus: RfcBus, started: Instant) {
    let mut ticker = tokio::time::interval(MONITOR_INTERVAL);
    loop {
        ticker.tick().await;
        NODES_CONNECTED.set(registry.nodes().len() as i64);
        RFC_PENDING.set(bus.pending_count() as i64);
        NODE_UPTIME.set(started.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::SERVER_ID;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    fn local(config: NodeConfig) -> NodeConfig {
        NodeConfig {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ..config
        }
    }

    #[tokio::test]
    async fn test_server_and_client_join() {
        let hub = StateHub::new();
        let server = NodeRuntime::start(&hub, local(NodeConfig::server())).await.unwrap();
        let client = timeout(WAIT, NodeRuntime::start(&hub, local(NodeConfig::client("stage"))))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(server.identity().id, SERVER_ID);
        server.registry().wait_for("stage").await.unwrap();
        assert_eq!(
            server.locate(&NodeAddress::Topological("stage".into())).unwrap(),
            client.node_id()
        );
        assert_eq!(
            client.locate(&NodeAddress::Topological(SERVER_ID.into())).unwrap(),
            server.node_id()
        );
        assert!(server.locate(&NodeAddress::Topological("ghost".into())).is_err());
    }

    #[tokio::test]
    async fn test_create_source_on_located_node() {
        let hub = StateHub::new();
        let server = NodeRuntime::start(&hub, local(NodeConfig::server())).await.unwrap();
        let client = NodeRuntime::start(&hub, local(NodeConfig::client("stage"))).await.unwrap();
        server.registry().wait_for("stage").await.unwrap();

        let target = server.locate(&NodeAddress::Topological("stage".into())).unwrap();
        let config = json!({
            "type": "stream-player", "id": "replay",
            "stream": [[{"source": "riot", "id": "0", "timestamp": 0.0}]],
        });
        let id = timeout(WAIT, server.manager().create_source(&config, Some(target)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(id, "replay");
        assert!(client.factory().contains("replay"));
    }

    #[tokio::test]
    async fn test_shutdown_releases_records() {
        let hub = StateHub::new();
        let server = NodeRuntime::start(&hub, local(NodeConfig::server())).await.unwrap();
        let client = NodeRuntime::start(&hub, local(NodeConfig::client("stage"))).await.unwrap();
        server.registry().wait_for("stage").await.unwrap();
        client
            .manager()
            .create_source(
                &json!({
                    "type": "stream-player", "id": "p",
                    "stream": [[{"source": "riot", "id": "0", "timestamp": 0.0}]],
                }),
                None,
            )
            .await
            .unwrap();
        server
            .manager()
            .sources()
            .wait_for(|snapshot| snapshot.get_str("id") == Some("p"))
            .await
            .unwrap();

        client.shutdown().await;
        client.shutdown().await;
        assert!(!client.is_running());

        timeout(
            WAIT,
            server
                .manager()
                .sources()
                .wait_until_absent(|snapshot| snapshot.get_str("id") == Some("p")),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(server.locate(&NodeAddress::Topological("stage".into())).is_err());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let hub = StateHub::new();
        let config = NodeConfig {
            watchdog_timeout: Duration::ZERO,
            ..NodeConfig::server()
        };
        let err = NodeRuntime::start(&hub, config).await.err().unwrap();
        assert!(err.to_string().contains("invalid node configuration"));
    }
}
