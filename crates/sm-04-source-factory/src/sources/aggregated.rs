//! # Aggregated Source
//!
//! Fan-in of several sources on the clock of the first (primary) one.
//!
//! - Secondary frames are buffered, latest wins.
//! - Each primary frame is published together with every buffered secondary
//!   frame restamped to the primary's timestamp and frequency.
//! - Nothing is published before the first primary frame.
//! - `active` follows primary traffic; losing the primary turns the
//!   aggregate inactive for good.

use shared_bus::{CollectionEvent, Subscription};
use shared_types::RecordId;
use sm_03_source_protocol::MultiFrame;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::core::{watch_record, SourceCore};
use crate::domain::{fields, Result};
use crate::timing::Watchdog;

pub struct AggregatedSource {
    core: Arc<SourceCore>,
    inputs: Vec<RecordId>,
    watchdog: Arc<Watchdog>,
    receiver: JoinHandle<()>,
    watcher: JoinHandle<()>,
}

impl AggregatedSource {
    /// `inputs` are the record ids of the input sources, primary first.
    pub(crate) fn spawn(
        core: Arc<SourceCore>,
        inputs: Vec<RecordId>,
        events: Subscription<CollectionEvent>,
        timeout: Duration,
    ) -> Result<Self> {
        let watcher = watch_record(core.clone(), |_| {})?;
        let watchdog = Arc::new(Watchdog::new(timeout, core.activity_callback()));
        let receiver = tokio::spawn(aggregate(
            core.clone(),
            watchdog.clone(),
            inputs.clone(),
            events,
        ));
        Ok(Self {
            core,
            inputs,
            watchdog,
            receiver,
            watcher,
        })
    }

    pub fn core(&self) -> &Arc<SourceCore> {
        &self.core
    }

    pub fn inputs(&self) -> &[RecordId] {
        &self.inputs
    }

    pub(crate) fn close(&self) {
        self.receiver.abort();
        self.watchdog.stop();
        self.watcher.abort();
        self.core.close();
    }
}

/// Primary frame followed by the buffered secondaries on the primary clock.
pub fn compose(primary: MultiFrame, secondaries: &[Option<MultiFrame>]) -> MultiFrame {
    let (timestamp, frequency) = primary
        .first()
        .map(|frame| (frame.timestamp, frame.frequency))
        .unwrap_or_default();
    let mut composite = primary;
    for buffered in secondaries.iter().flatten() {
        composite.extend(
            buffered
                .iter()
                .map(|frame| frame.restamped(timestamp, frequency)),
        );
    }
    composite
}

async fn aggregate(
    core: Arc<SourceCore>,
    watchdog: Arc<Watchdog>,
    inputs: Vec<RecordId>,
    mut events: Subscription<CollectionEvent>,
) {
    let primary = inputs[0];
    let mut buffers: Vec<Option<MultiFrame>> = vec![None; inputs.len()];

    while let Some(event) = events.recv().await {
        match event {
            CollectionEvent::Updated { record_id, updates } => {
                let Some(index) = inputs.iter().position(|input| *input == record_id) else {
                    continue;
                };
                let Some(value) = updates.get(fields::FRAME) else {
                    continue;
                };
                let frame: MultiFrame = match serde_json::from_value(value.clone()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        debug!(source_id = %core.id(), error = %e, "[sm-04] Ignoring malformed input frame");
                        continue;
                    }
                };
                if index == 0 {
                    watchdog.kick();
                    core.publish(&compose(frame, &buffers[1..]));
                } else {
                    buffers[index] = Some(frame);
                }
            }
            CollectionEvent::Deleted { record_id } if record_id == primary => {
                info!(source_id = %core.id(), "[sm-04] Primary source lost");
                watchdog.expire();
                watchdog.stop();
                break;
            }
            CollectionEvent::Deleted { record_id } => {
                for (input, buffer) in inputs.iter().zip(buffers.iter_mut()) {
                    if *input == record_id {
                        *buffer = None;
                    }
                }
            }
            CollectionEvent::Created(_) => {}
        }
    }
}
