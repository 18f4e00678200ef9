//! OSC over UDP listener shared by every source bound to one port.

use rosc::OscPacket;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{Result, SourceError};
use crate::metrics;

/// Packets buffered per subscriber before it starts lagging.
pub const PACKET_BACKLOG: usize = 1024;

const MAX_DATAGRAM: usize = 65_536;

/// Listener decoding OSC packets and fanning them out to subscribers.
pub struct OscUdpListener {
    local_addr: SocketAddr,
    packets: broadcast::Sender<Arc<OscPacket>>,
    task: JoinHandle<()>,
}

impl OscUdpListener {
    /// Bind `addr`. Port 0 binds an ephemeral port, see [`port`](Self::port).
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let endpoint = format!("udp://{addr}");
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| SourceError::transport(&endpoint, e))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| SourceError::transport(&endpoint, e))?;
        let (packets, _) = broadcast::channel(PACKET_BACKLOG);
        let task = tokio::spawn(receive_loop(socket, packets.clone()));
        info!(%local_addr, "[sm-04] OSC listener bound");
        Ok(Self {
            local_addr,
            packets,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Bound port.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Receive every packet arriving from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<OscPacket>> {
        self.packets.subscribe()
    }

    /// Stop receiving. Subscribers see the channel close.
    pub fn close(&self) {
        self.task.abort();
    }
}

impl Drop for OscUdpListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn receive_loop(socket: UdpSocket, packets: broadcast::Sender<Arc<OscPacket>>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, peer)) => match rosc::decoder::decode_udp(&buf[..len]) {
                Ok((_, packet)) => {
                    // no subscriber is not an error
                    let _ = packets.send(Arc::new(packet));
                }
                Err(e) => {
                    metrics::record_datagram_dropped("osc-decode");
                    debug!(%peer, error = ?e, "[sm-04] Dropping undecodable OSC datagram");
                }
            },
            Err(e) => warn!(error = %e, "[sm-04] UDP receive failed"),
        }
    }
}
