//! OSC over UDP hardware bridge.

use rosc::OscPacket;
use shared_types::TimeSource;
use sm_03_source_protocol::{source_route, DecoderOptions, FrameDecoder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::core::{watch_record, SourceCore};
use crate::adapters::OscUdpListener;
use crate::domain::{Result, RiotConfig};
use crate::metrics;
use crate::timing::Watchdog;

pub struct RiotSource {
    core: Arc<SourceCore>,
    port: u16,
    watchdog: Arc<Watchdog>,
    receiver: JoinHandle<()>,
    watcher: JoinHandle<()>,
}

impl RiotSource {
    pub(crate) fn spawn(
        core: Arc<SourceCore>,
        config: &RiotConfig,
        listener: &OscUdpListener,
        timeout: Duration,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self> {
        let watcher = watch_record(core.clone(), |_| {})?;
        let watchdog = Arc::new(Watchdog::new(timeout, core.activity_callback()));
        let decoder = FrameDecoder::with_clock(
            DecoderOptions {
                bno055: config.bno055,
            },
            clock,
        );
        let receiver = tokio::spawn(receive(
            core.clone(),
            watchdog.clone(),
            listener.subscribe(),
            decoder,
        ));
        Ok(Self {
            core,
            port: listener.port(),
            watchdog,
            receiver,
            watcher,
        })
    }

    pub fn core(&self) -> &Arc<SourceCore> {
        &self.core
    }

    /// Bound UDP port.
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

async fn receive(
    core: Arc<SourceCore>,
    watchdog: Arc<Watchdog>,
    mut packets: broadcast::Receiver<Arc<OscPacket>>,
    mut decoder: FrameDecoder,
) {
    loop {
        let packet = match packets.recv().await {
            Ok(packet) => packet,
            Err(RecvError::Lagged(skipped)) => {
                metrics::record_datagram_dropped("lagged");
                warn!(source_id = %core.id(), skipped, "[sm-04] Source fell behind its listener");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        match source_route(&packet) {
            Some((_, id)) if id == core.id() => {}
            _ => continue,
        }
        match decoder.decode(&packet) {
            Ok(frame) => {
                watchdog.kick();
                // the first bundle of a device only seeds frequency estimation
                if let Some(frame) = frame {
                    core.publish(&vec![frame]);
                }
            }
            Err(e) => {
                metrics::record_datagram_dropped("frame-decode");
                debug!(source_id = %core.id(), error = %e, "[sm-04] Dropping undecodable bundle");
            }
        }
    }
}
