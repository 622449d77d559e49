//! UDP transport backed by a tokio socket.

use std::net::SocketAddr;

use async_trait::async_trait;
use atem_core::protocol::packet::MAX_PACKET_SIZE;
use tokio::net::UdpSocket;
use tracing::{debug, trace};

use super::{Transport, TransportError};

/// Receive buffer size.  Larger than any valid packet so an oversized
/// datagram is seen whole and rejected by the packet decoder instead of being
/// silently truncated into something plausible.
const RECV_BUFFER_SIZE: usize = MAX_PACKET_SIZE * 2;

/// A bound UDP socket.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Binds a socket to `addr`.  Port 0 picks an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Bind`] if the address is unavailable.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        debug!(local = ?socket.local_addr().ok(), "udp transport bound");
        Ok(Self { socket })
    }

    /// The address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> Result<(), TransportError> {
        let sent = self.socket.send_to(bytes, addr).await?;
        trace!(%addr, len = sent, "datagram sent");
        Ok(())
    }

    async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let (len, from) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        trace!(%from, len, "datagram received");
        Ok((buf, from))
    }
}
