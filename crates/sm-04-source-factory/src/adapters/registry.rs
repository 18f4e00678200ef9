//! # Transport Registry
//!
//! Process-wide owner of sockets shared between sources: one OSC listener
//! and one WebSocket server per port, one OSC client per destination.
//! Deleting a source never closes a transport; [`TransportRegistry::shutdown`]
//! closes them all.
//!
//! Port 0 always binds a fresh ephemeral port, registered under the port the
//! OS picked.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::osc_client::OscClient;
use super::osc_udp::OscUdpListener;
use super::websocket::WsServer;
use crate::domain::{Destination, Result};

pub struct TransportRegistry {
    bind_address: IpAddr,
    udp: Mutex<HashMap<u16, Arc<OscUdpListener>>>,
    ws: Mutex<HashMap<u16, Arc<WsServer>>>,
    osc_clients: Mutex<HashMap<String, Arc<OscClient>>>,
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

impl TransportRegistry {
    /// Registry binding its listeners on `bind_address`.
    pub fn new(bind_address: IpAddr) -> Self {
        Self {
            bind_address,
            udp: Mutex::new(HashMap::new()),
            ws: Mutex::new(HashMap::new()),
            osc_clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn bind_address(&self) -> IpAddr {
        self.bind_address
    }

    /// OSC listener on `port`, bound on first use.
    pub async fn udp_listener(&self, port: u16) -> Result<Arc<OscUdpListener>> {
        let mut udp = self.udp.lock().await;
        if port != 0 {
            if let Some(listener) = udp.get(&port) {
                return Ok(listener.clone());
            }
        }
        let listener = Arc::new(OscUdpListener::bind(SocketAddr::new(self.bind_address, port)).await?);
        udp.insert(listener.port(), listener.clone());
        Ok(listener)
    }

    /// WebSocket server on `port`, bound on first use.
    pub async fn ws_server(&self, port: u16) -> Result<Arc<WsServer>> {
        let mut ws = self.ws.lock().await;
        if port != 0 {
            if let Some(server) = ws.get(&port) {
                return Ok(server.clone());
            }
        }
        let server = Arc::new(WsServer::bind(SocketAddr::new(self.bind_address, port)).await?);
        ws.insert(server.port(), server.clone());
        Ok(server)
    }

    /// OSC client to `destination`, created on first use.
    pub async fn osc_client(&self, destination: &Destination) -> Result<Arc<OscClient>> {
        let mut clients = self.osc_clients.lock().await;
        let endpoint = destination.endpoint();
        if let Some(client) = clients.get(&endpoint) {
            return Ok(client.clone());
        }
        let client = Arc::new(OscClient::connect(destination).await?);
        clients.insert(endpoint, client.clone());
        Ok(client)
    }

    /// `(udp listeners, websocket servers, osc clients)` currently open.
    pub async fn counts(&self) -> (usize, usize, usize) {
        (
            self.udp.lock().await.len(),
            self.ws.lock().await.len(),
            self.osc_clients.lock().await.len(),
        )
    }

    /// Close every transport.
    pub async fn shutdown(&self) {
        let udp: Vec<_> = self.udp.lock().await.drain().collect();
        let ws: Vec<_> = self.ws.lock().await.drain().collect();
        let clients = self.osc_clients.lock().await.drain().count();
        for (_, listener) in &udp {
            listener.close();
        }
        for (_, server) in &ws {
            server.close();
        }
        info!(
            udp = udp.len(),
            ws = ws.len(),
            osc_clients = clients,
            "[sm-04] Transports closed"
        );
    }
}
