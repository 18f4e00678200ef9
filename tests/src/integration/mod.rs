//! # Cross-Node Integration Flows
//!
//! Every flow runs a server node and one or more client nodes as
//! `NodeRuntime`s connected to one `StateHub`, the way separate processes
//! would share a replicated state server.

pub mod codec_flows;
pub mod rfc_flows;
pub mod source_flows;
pub mod transport_flows;

#[cfg(test)]
pub(crate) mod support {
    use serde_json::{json, Value};
    use shared_bus::{Collection, CollectionEvent, StateHub, Subscription};
    use shared_types::RecordId;
    use sm_03_source_protocol::MultiFrame;
    use sm_04_source_factory::fields;
    use sm_runtime::{NodeConfig, NodeRuntime};
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;
    use tokio::time::timeout;

    pub const WAIT: Duration = Duration::from_secs(3);

    /// Short timers so watchdog and playback flows finish quickly.
    pub fn fast(config: NodeConfig) -> NodeConfig {
        NodeConfig {
            watchdog_timeout: Duration::from_millis(100),
            lookahead: Duration::from_millis(2),
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ..config
        }
    }

    pub struct Mesh {
        pub hub: StateHub,
        pub server: NodeRuntime,
        pub clients: Vec<NodeRuntime>,
    }

    impl Mesh {
        pub fn client(&self, index: usize) -> &NodeRuntime {
            &self.clients[index]
        }
    }

    /// Server plus one client per id, all registered and visible to each other.
    pub async fn mesh(client_ids: &[&str]) -> Mesh {
        let hub = StateHub::new();
        let server = NodeRuntime::start(&hub, fast(NodeConfig::server()))
            .await
            .unwrap();
        let mut clients = Vec::new();
        for id in client_ids {
            let client = timeout(WAIT, NodeRuntime::start(&hub, fast(NodeConfig::client(*id))))
                .await
                .unwrap()
                .unwrap();
            timeout(WAIT, server.registry().wait_for(id))
                .await
                .unwrap()
                .unwrap();
            clients.push(client);
        }
        Mesh {
            hub,
            server,
            clients,
        }
    }

    /// Stream of `count` single-device frames 10 ms apart.
    pub fn stream(count: usize) -> Value {
        let frames: Vec<Value> = (0..count)
            .map(|i| {
                json!([{
                    "source": "riot", "id": "0",
                    "timestamp": 10.0 * i as f64, "frequency": 100.0,
                    "control": {"index": i as f64},
                }])
            })
            .collect();
        Value::Array(frames)
    }

    pub fn player(id: &str, count: usize) -> Value {
        json!({"type": "stream-player", "id": id, "stream": stream(count)})
    }

    /// Next frame published on `record_id`.
    pub async fn next_frame(
        events: &mut Subscription<CollectionEvent>,
        record_id: RecordId,
    ) -> MultiFrame {
        timeout(WAIT, async {
            loop {
                match events.recv().await {
                    Some(CollectionEvent::Updated {
                        record_id: id,
                        updates,
                    }) if id == record_id => {
                        if let Some(frame) = updates.get(fields::FRAME) {
                            return serde_json::from_value(frame.clone()).unwrap();
                        }
                    }
                    Some(_) => {}
                    None => panic!("collection closed"),
                }
            }
        })
        .await
        .unwrap()
    }

    /// Wait until source `record_id` reports `active`.
    pub async fn wait_active(sources: &Collection, record_id: RecordId, active: bool) {
        timeout(
            WAIT,
            sources.wait_for(|snapshot| {
                snapshot.record_id == record_id
                    && snapshot.get(fields::ACTIVE) == Some(&json!(active))
            }),
        )
        .await
        .unwrap()
        .unwrap();
    }
}
