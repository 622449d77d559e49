//! Datagram transports for the session task.
//!
//! Architecture:
//! - [`Transport`] is the seam between the session task and the outside
//!   world: one method to send a datagram, one to wait for the next.
//! - [`udp::UdpTransport`] wraps a tokio `UdpSocket`.
//! - [`memory::MemoryTransport`] pairs two endpoints in-process so a fake
//!   device can be scripted in tests.
//!
//! Transports do not retry or reorder anything; the session's reliability
//! layer handles loss on top of them.

pub mod memory;
pub mod udp;

use std::net::SocketAddr;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while moving datagrams.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The local socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// A send or receive failed.  Usually transient for UDP.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The other end of the transport is gone; no datagram will ever arrive.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// `true` when the transport can never be used again.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Closed | TransportError::Bind { .. })
    }
}

/// Sends and receives whole datagrams.
///
/// `recv_from` must be cancel safe: the session task polls it inside a
/// `select!` and drops the future whenever another branch wins.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends one datagram to `addr`.
    async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> Result<(), TransportError>;

    /// Waits for the next datagram and returns it with its source address.
    async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_is_fatal_but_io_is_not() {
        assert!(TransportError::Closed.is_fatal());
        assert!(!TransportError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused)).is_fatal());
    }

    #[tokio::test]
    async fn test_mock_transport_reports_configured_failure() {
        // Arrange
        let mut transport = MockTransport::new();
        transport
            .expect_send_to()
            .returning(|_, _| Err(TransportError::Closed));

        // Act
        let result = transport.send_to(&[0u8; 12], "127.0.0.1:9910".parse().unwrap()).await;

        // Assert
        assert!(matches!(result, Err(TransportError::Closed)));
    }
}
