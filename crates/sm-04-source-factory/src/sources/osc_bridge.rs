//! Forwarder re-encoding another source's frames to an OSC destination.

use serde_json::Value;
use shared_bus::{CollectionEvent, Subscription};
use shared_types::RecordId;
use sm_03_source_protocol::{encode_bytes, MultiFrame, WireVariant};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::core::{watch_record, SourceCore};
use crate::adapters::OscClient;
use crate::domain::{fields, Result};
use crate::metrics;

pub struct OscBridgeSource {
    core: Arc<SourceCore>,
    input: RecordId,
    forwarder: JoinHandle<()>,
    watcher: JoinHandle<()>,
}

impl OscBridgeSource {
    /// Mirror `input`, currently `input_active`, to `client`.
    pub(crate) fn spawn(
        core: Arc<SourceCore>,
        input: RecordId,
        input_active: bool,
        events: Subscription<CollectionEvent>,
        client: Arc<OscClient>,
        variant: WireVariant,
    ) -> Result<Self> {
        let watcher = watch_record(core.clone(), |_| {})?;
        core.set_active(input_active);
        let forwarder = tokio::spawn(forward(core.clone(), input, events, client, variant));
        Ok(Self {
            core,
            input,
            forwarder,
            watcher,
        })
    }

    pub fn core(&self) -> &Arc<SourceCore> {
        &self.core
    }

    /// Record id of the forwarded source.
    pub fn input(&self) -> RecordId {
        self.input
    }

    pub(crate) fn close(&self) {
        self.forwarder.abort();
        self.watcher.abort();
        self.core.close();
    }
}

async fn forward(
    core: Arc<SourceCore>,
    input: RecordId,
    mut events: Subscription<CollectionEvent>,
    client: Arc<OscClient>,
    variant: WireVariant,
) {
    while let Some(event) = events.recv().await {
        match event {
            CollectionEvent::Updated { record_id, updates } if record_id == input => {
                if let Some(active) = updates.get(fields::ACTIVE).and_then(Value::as_bool) {
                    core.set_active(active);
                }
                if let Some(value) = updates.get(fields::FRAME) {
                    send_frame(&core, &client, variant, value).await;
                }
            }
            CollectionEvent::Deleted { record_id } if record_id == input => {
                info!(source_id = %core.id(), "[sm-04] Forwarded source lost");
                core.set_active(false);
                break;
            }
            _ => {}
        }
    }
}

async fn send_frame(core: &SourceCore, client: &OscClient, variant: WireVariant, value: &Value) {
    let frame: MultiFrame = match serde_json::from_value(value.clone()) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(source_id = %core.id(), error = %e, "[sm-04] Ignoring malformed input frame");
            return;
        }
    };
    for channel in &frame {
        let bytes = match encode_bytes(channel, variant) {
            Ok(bytes) => bytes,
            Err(e) => {
                metrics::record_datagram_dropped("frame-encode");
                debug!(source_id = %core.id(), error = %e, "[sm-04] Frame not encodable");
                continue;
            }
        };
        if let Err(e) = client.send(&bytes).await {
            metrics::record_datagram_dropped("osc-send");
            debug!(source_id = %core.id(), error = %e, "[sm-04] Forwarding failed");
        }
    }
}
