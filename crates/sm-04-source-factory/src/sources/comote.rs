//! WebSocket hardware bridge.

use serde_json::Value;
use sm_03_source_protocol::parse_json_frame;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::core::{watch_record, SourceCore};
use crate::adapters::WsServer;
use crate::domain::Result;
use crate::metrics;
use crate::timing::Watchdog;

pub struct ComoteSource {
    core: Arc<SourceCore>,
    port: u16,
    watchdog: Arc<Watchdog>,
    receiver: JoinHandle<()>,
    watcher: JoinHandle<()>,
}

impl ComoteSource {
    pub(crate) fn spawn(core: Arc<SourceCore>, server: &WsServer, timeout: Duration) -> Result<Self> {
        let watcher = watch_record(core.clone(), |_| {})?;
        let watchdog = Arc::new(Watchdog::new(timeout, core.activity_callback()));
        let receiver = tokio::spawn(receive(core.clone(), watchdog.clone(), server.subscribe()));
        Ok(Self {
            core,
            port: server.port(),
            watchdog,
            receiver,
            watcher,
        })
    }

    pub fn core(&self) -> &Arc<SourceCore> {
        &self.core
    }

    /// Bound WebSocket port.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub(crate) fn close(&self) {
        self.receiver.abort();
        self.watchdog.stop();
        self.watcher.abort();
        self.core.close();
    }
}

/// Whether a datagram's `id` names `id`. Devices send it as string or number.
fn addressed_to(datagram: &Value, id: &str) -> bool {
    match datagram.get("id") {
        Some(Value::String(value)) => value == id,
        Some(Value::Number(value)) => value.to_string() == id,
        _ => false,
    }
}

async fn receive(
    core: Arc<SourceCore>,
    watchdog: Arc<Watchdog>,
    mut datagrams: broadcast::Receiver<Arc<Value>>,
) {
    loop {
        let datagram = match datagrams.recv().await {
            Ok(datagram) => datagram,
            Err(RecvError::Lagged(skipped)) => {
                metrics::record_datagram_dropped("lagged");
                warn!(source_id = %core.id(), skipped, "[sm-04] Source fell behind its listener");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        if !addressed_to(&datagram, core.id()) {
            continue;
        }
        match parse_json_frame(&datagram) {
            Ok(frame) => {
                watchdog.kick();
                core.publish(&vec![frame]);
            }
            Err(e) => {
                metrics::record_datagram_dropped("frame-decode");
                debug!(source_id = %core.id(), error = %e, "[sm-04] Dropping malformed datagram");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_addressed_to() {
        assert!(addressed_to(&json!({"id": "phone"}), "phone"));
        assert!(addressed_to(&json!({"id": 7}), "7"));
        assert!(!addressed_to(&json!({"id": "other"}), "phone"));
        assert!(!addressed_to(&json!({"source": "comote"}), "phone"));
    }
}
