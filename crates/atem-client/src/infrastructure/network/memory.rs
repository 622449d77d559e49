//! In-process transport for tests and simulations.
//!
//! [`MemoryTransport::pair`] returns two connected endpoints with made-up
//! addresses.  Datagrams sent to any address other than the peer's vanish,
//! just as they would on a real network.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::trace;

use super::{Transport, TransportError};

type Datagram = (Vec<u8>, SocketAddr);

/// One end of an in-memory datagram link.
#[derive(Debug)]
pub struct MemoryTransport {
    local: SocketAddr,
    peer: SocketAddr,
    outbound: mpsc::UnboundedSender<Datagram>,
    inbound: Mutex<mpsc::UnboundedReceiver<Datagram>>,
    drop_outbound: AtomicUsize,
}

impl MemoryTransport {
    /// Creates two endpoints that can reach each other.
    pub fn pair(a: SocketAddr, b: SocketAddr) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (Self::new(a, b, a_tx, a_rx), Self::new(b, a, b_tx, b_rx))
    }

    fn new(
        local: SocketAddr,
        peer: SocketAddr,
        outbound: mpsc::UnboundedSender<Datagram>,
        inbound: mpsc::UnboundedReceiver<Datagram>,
    ) -> Self {
        Self {
            local,
            peer,
            outbound,
            inbound: Mutex::new(inbound),
            drop_outbound: AtomicUsize::new(0),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Silently loses the next `count` datagrams sent from this end.
    pub fn drop_next(&self, count: usize) {
        self.drop_outbound.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> Result<(), TransportError> {
        if addr != self.peer {
            trace!(%addr, "no such peer; datagram lost");
            return Ok(());
        }
        let lost = self
            .drop_outbound
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lost {
            trace!(len = bytes.len(), "datagram dropped");
            return Ok(());
        }
        self.outbound
            .send((bytes.to_vec(), self.local))
            .map_err(|_| TransportError::Closed)
    }

    async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        self.inbound.lock().await.recv().await.ok_or(TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn addrs() -> (SocketAddr, SocketAddr) {
        ("10.0.0.1:50000".parse().unwrap(), "10.0.0.2:9910".parse().unwrap())
    }

    #[tokio::test]
    async fn test_pair_delivers_with_sender_address() {
        // Arrange
        let (a_addr, b_addr) = addrs();
        let (a, b) = MemoryTransport::pair(a_addr, b_addr);

        // Act
        assert_ok!(a.send_to(b"hello", b_addr).await);
        let (bytes, from) = assert_ok!(b.recv_from().await);

        // Assert
        assert_eq!(bytes, b"hello");
        assert_eq!(from, a_addr);
    }

    #[tokio::test]
    async fn test_drop_next_loses_exactly_that_many() {
        // Arrange
        let (a_addr, b_addr) = addrs();
        let (a, b) = MemoryTransport::pair(a_addr, b_addr);
        a.drop_next(2);

        // Act
        for n in 1..=3u8 {
            assert_ok!(a.send_to(&[n], b_addr).await);
        }

        // Assert
        let (bytes, _) = assert_ok!(b.recv_from().await);
        assert_eq!(bytes, vec![3]);
    }

    #[tokio::test]
    async fn test_unknown_address_is_silently_lost() {
        let (a_addr, b_addr) = addrs();
        let (a, b) = MemoryTransport::pair(a_addr, b_addr);

        assert_ok!(a.send_to(b"lost", "10.0.0.9:9910".parse().unwrap()).await);
        assert_ok!(a.send_to(b"kept", b_addr).await);

        let (bytes, _) = assert_ok!(b.recv_from().await);
        assert_eq!(bytes, b"kept");
    }

    #[tokio::test]
    async fn test_dropped_peer_closes_transport() {
        let (a_addr, b_addr) = addrs();
        let (a, b) = MemoryTransport::pair(a_addr, b_addr);
        drop(b);

        assert_err!(a.send_to(b"x", b_addr).await);
        assert!(matches!(a.recv_from().await, Err(TransportError::Closed)));
    }
}
