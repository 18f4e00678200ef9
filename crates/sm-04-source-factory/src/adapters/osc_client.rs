//! OSC over UDP sender to one destination.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::{lookup_host, UdpSocket};
use tracing::info;

use crate::domain::{Destination, Result, SourceError};

pub struct OscClient {
    endpoint: String,
    target: SocketAddr,
    socket: UdpSocket,
}

impl OscClient {
    /// Resolve the destination once and bind a local socket for it.
    pub async fn connect(destination: &Destination) -> Result<Self> {
        let endpoint = destination.endpoint();
        let target = lookup_host(endpoint.as_str())
            .await
            .map_err(|e| SourceError::transport(&endpoint, e))?
            .next()
            .ok_or_else(|| SourceError::transport(&endpoint, "hostname resolved to no address"))?;
        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| SourceError::transport(&endpoint, e))?;
        info!(endpoint, %target, "[sm-04] OSC client ready");
        Ok(Self {
            endpoint,
            target,
            socket,
        })
    }

    /// `hostname:port` as configured.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Send one datagram.
    pub async fn send(&self, bytes: &[u8]) -> Result<()> {
        self.socket
            .send_to(bytes, self.target)
            .await
            .map(|_| ())
            .map_err(|e| SourceError::transport(&self.endpoint, e))
    }
}
