//! WebSocket server shared by every source bound to one port.
//!
//! Each text or binary message is parsed as JSON and fanned out; routing to
//! a source by id happens on the subscriber side.

use futures_util::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{Result, SourceError};
use crate::metrics;

/// Datagrams buffered per subscriber before it starts lagging.
pub const DATAGRAM_BACKLOG: usize = 1024;

type Connections = Arc<Mutex<Vec<JoinHandle<()>>>>;

pub struct WsServer {
    local_addr: SocketAddr,
    datagrams: broadcast::Sender<Arc<Value>>,
    accept_task: JoinHandle<()>,
    connections: Connections,
}

impl WsServer {
    /// Bind `addr`. Port 0 binds an ephemeral port, see [`port`](Self::port).
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let endpoint = format!("ws://{addr}");
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| SourceError::transport(&endpoint, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| SourceError::transport(&endpoint, e))?;
        let (datagrams, _) = broadcast::channel(DATAGRAM_BACKLOG);
        let connections = Connections::default();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            datagrams.clone(),
            connections.clone(),
        ));
        info!(%local_addr, "[sm-04] WebSocket server bound");
        Ok(Self {
            local_addr,
            datagrams,
            accept_task,
            connections,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Receive every JSON datagram arriving from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Value>> {
        self.datagrams.subscribe()
    }

    /// Open client connections.
    pub fn connection_count(&self) -> usize {
        self.connections
            .lock()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Stop accepting and drop every connection.
    pub fn close(&self) {
        self.accept_task.abort();
        for handle in self.connections.lock().drain(..) {
            handle.abort();
        }
    }
}

impl Drop for WsServer {
    fn drop(&mut self) {
        self.close();
    }
}

async fn accept_loop(
    listener: TcpListener,
    datagrams: broadcast::Sender<Arc<Value>>,
    connections: Connections,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "[sm-04] WebSocket accept failed");
                continue;
            }
        };
        let handle = tokio::spawn(serve_connection(stream, peer, datagrams.clone()));
        let mut connections = connections.lock();
        connections.retain(|handle| !handle.is_finished());
        connections.push(handle);
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    datagrams: broadcast::Sender<Arc<Value>>,
) {
    let mut socket = match tokio_tungstenite::accept_async(stream).await {
        Ok(socket) => socket,
        Err(e) => {
            debug!(%peer, error = %e, "[sm-04] WebSocket handshake failed");
            return;
        }
    };
    debug!(%peer, "[sm-04] WebSocket client connected");

    while let Some(message) = socket.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                debug!(%peer, error = %e, "[sm-04] WebSocket read failed");
                break;
            }
        };
        if message.is_close() {
            break;
        }
        if !(message.is_text() || message.is_binary()) {
            continue;
        }
        let parsed = message
            .to_text()
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<Value>(text).map_err(|e| e.to_string()));
        match parsed {
            Ok(value) => {
                let _ = datagrams.send(Arc::new(value));
            }
            Err(e) => {
                metrics::record_datagram_dropped("json-decode");
                debug!(%peer, error = %e, "[sm-04] Dropping malformed WebSocket datagram");
            }
        }
    }
    debug!(%peer, "[sm-04] WebSocket client disconnected");
}
