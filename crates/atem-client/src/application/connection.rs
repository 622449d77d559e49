//! Session task: drives one [`Session`] over a [`Transport`].
//!
//! # How the task works (for beginners)
//!
//! [`connect`] sends the hello, then spawns a task that owns both the
//! transport and the session.  The task waits on three things at once:
//!
//! - a datagram from the transport → [`Session::receive`]
//! - a command from a [`ConnectionHandle`] → [`Session::send`] or
//!   [`Session::disconnect`]
//! - the tick interval → [`Session::poll`] (resends, delayed acks, timeouts)
//!
//! Whatever the session returns is sent on the transport and forwarded as
//! [`ConnectionEvent`]s.  Because only this task touches the session, no
//! locking is needed.
//!
//! The clock is read with `tokio::time::Instant`, so tests that pause tokio
//! time control every timer in the session as well.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use atem_core::session::SessionOutput;
use atem_core::{
    AtemMessage, CloseReason, MessageError, PacketError, SequenceNumber, Session, SessionConfig, SessionError,
    SessionEvent,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::infrastructure::network::{Transport, TransportError};

/// Session ids a client may pick for itself.  The device hands out ids with
/// the top bit set, so clients stay below it.
const CLIENT_SESSION_IDS: std::ops::Range<u16> = 1..0x8000;

/// Errors surfaced to users of a connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),
    /// The session ended before the initial state dump completed.
    #[error("session closed during setup: {0:?}")]
    Closed(CloseReason),
    /// The session task has stopped; the connection is gone.
    #[error("connection task is no longer running")]
    TaskGone,
}

/// Settings for [`connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub session: SessionConfig,
    /// How often the session timers are polled.
    pub tick_interval: Duration,
    /// Id to introduce ourselves with.  `None` picks one at random.
    pub client_session_id: Option<u16>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            tick_interval: Duration::from_millis(20),
            client_session_id: None,
        }
    }
}

/// Events delivered to the consumer, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// One decoded message, or why its body could not be decoded.
    Message(Result<AtemMessage, MessageError>),
    /// The device finished sending its initial state.
    Connected { session_id: u16 },
    /// The session ended.  No further events follow.
    Closed(CloseReason),
}

#[derive(Debug)]
enum Command {
    Send {
        messages: Vec<AtemMessage>,
        reply: oneshot::Sender<Result<SequenceNumber, ConnectionError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle for sending commands to a running session.
///
/// Dropping every handle disconnects the session.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    session_id: u16,
}

impl ConnectionHandle {
    /// Session id the device assigned.
    pub fn session_id(&self) -> u16 {
        self.session_id
    }

    /// Sends `messages` in one reliable packet and returns its sequence number.
    ///
    /// # Errors
    ///
    /// Fails if the messages cannot be encoded, do not fit in one packet, or
    /// the session has ended.
    pub async fn send(&self, messages: Vec<AtemMessage>) -> Result<SequenceNumber, ConnectionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Send { messages, reply })
            .map_err(|_| ConnectionError::TaskGone)?;
        response.await.map_err(|_| ConnectionError::TaskGone)?
    }

    /// Ends the session and waits until the Disconnect has been sent.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::TaskGone`] if the session had already ended.
    pub async fn disconnect(&self) -> Result<(), ConnectionError> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(Command::Disconnect { reply })
            .map_err(|_| ConnectionError::TaskGone)?;
        done.await.map_err(|_| ConnectionError::TaskGone)
    }
}

/// Connects to the device at `addr` and waits for its initial state dump.
///
/// Messages that make up the dump are already queued on the returned event
/// receiver, followed by [`ConnectionEvent::Connected`].
///
/// # Errors
///
/// Fails if the hello cannot be sent, the handshake fails or is rejected, or
/// the session closes before the dump completes.
pub async fn connect<T: Transport>(
    transport: T,
    addr: SocketAddr,
    config: ConnectionConfig,
) -> Result<(ConnectionHandle, mpsc::UnboundedReceiver<ConnectionEvent>), ConnectionError> {
    let client_session_id = config
        .client_session_id
        .unwrap_or_else(|| rand::random_range(CLIENT_SESSION_IDS));
    let mut session = Session::new(config.session, client_session_id);

    let hello = session.connect(now())?;
    transport.send_to(&hello.encode()?, addr).await?;
    info!(%addr, "connecting to switcher");

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (ready_tx, ready_rx) = oneshot::channel();

    let task = SessionTask {
        transport,
        addr,
        session,
        tick_interval: config.tick_interval,
        events: events_tx,
        commands: commands_rx,
        ready: Some(ready_tx),
    };
    tokio::spawn(task.run());

    let session_id = ready_rx.await.map_err(|_| ConnectionError::TaskGone)??;
    let handle = ConnectionHandle {
        commands: commands_tx,
        session_id,
    };
    Ok((handle, events_rx))
}

fn now() -> Instant {
    time::Instant::now().into_std()
}

struct SessionTask<T> {
    transport: T,
    addr: SocketAddr,
    session: Session,
    tick_interval: Duration,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    ready: Option<oneshot::Sender<Result<u16, ConnectionError>>>,
}

impl<T: Transport> SessionTask<T> {
    async fn run(mut self) {
        let mut ticker = time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                received = self.transport.recv_from() => match received {
                    Ok((datagram, from)) if from == self.addr => {
                        let output = self.session.receive(&datagram, now());
                        if self.flush(output).await {
                            break;
                        }
                    }
                    Ok((_, from)) => debug!(%from, "ignoring datagram from unexpected address"),
                    Err(e) if e.is_fatal() => {
                        error!(error = %e, "transport failed; ending session");
                        self.resolve(Err(e.into()));
                        break;
                    }
                    Err(e) => warn!(error = %e, "transport receive failed"),
                },
                command = self.commands.recv() => match command {
                    Some(Command::Send { messages, reply }) => {
                        let output = match self.session.send(&messages, now()) {
                            Ok(packet) => {
                                let _ = reply.send(Ok(Session::sequence_of(&packet)));
                                SessionOutput { outbound: vec![packet], events: Vec::new() }
                            }
                            Err(e) => {
                                let _ = reply.send(Err(e.into()));
                                continue;
                            }
                        };
                        if self.flush(output).await {
                            break;
                        }
                    }
                    Some(Command::Disconnect { reply }) => {
                        let output = self.session.disconnect();
                        self.flush(output).await;
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        debug!("all handles dropped; disconnecting");
                        let output = self.session.disconnect();
                        self.flush(output).await;
                        break;
                    }
                },
                _ = ticker.tick() => {
                    let output = self.session.poll(now());
                    if self.flush(output).await {
                        break;
                    }
                }
            }
        }
        debug!("session task stopped");
    }

    /// Sends outbound packets and forwards events.  Returns `true` once the
    /// session has closed.
    async fn flush(&mut self, output: SessionOutput) -> bool {
        for packet in &output.outbound {
            let bytes = match packet.encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(error = %e, "failed to encode packet");
                    continue;
                }
            };
            // Lost sends are recovered by retransmission.
            if let Err(e) = self.transport.send_to(&bytes, self.addr).await {
                warn!(error = %e, "failed to send packet");
            }
        }

        let mut closed = false;
        for event in output.events {
            match event {
                SessionEvent::Established { session_id } => {
                    info!(session_id = %format!("0x{session_id:04X}"), "session established");
                }
                SessionEvent::Message(item) => self.emit(ConnectionEvent::Message(item)),
                SessionEvent::Connected => {
                    let session_id = self.session.session_id();
                    self.resolve(Ok(session_id));
                    self.emit(ConnectionEvent::Connected { session_id });
                }
                SessionEvent::Closed(reason) => {
                    let setup_error = match &reason {
                        CloseReason::Failed(e) => ConnectionError::Session(e.clone()),
                        other => ConnectionError::Closed(other.clone()),
                    };
                    self.resolve(Err(setup_error));
                    self.emit(ConnectionEvent::Closed(reason));
                    closed = true;
                }
            }
        }
        closed
    }

    fn emit(&self, event: ConnectionEvent) {
        if self.events.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }

    /// Completes the pending [`connect`] call, if it is still waiting.
    fn resolve(&mut self, result: Result<u16, ConnectionError>) {
        if let Some(ready) = self.ready.take() {
            let _ = ready.send(result);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::network::MockTransport;

    fn device() -> SocketAddr {
        "192.168.10.240:9910".parse().unwrap()
    }

    #[test]
    fn test_connection_config_default_ticks_every_twenty_ms() {
        let config = ConnectionConfig::default();
        assert_eq!(config.tick_interval, Duration::from_millis(20));
        assert_eq!(config.client_session_id, None);
    }

    #[tokio::test]
    async fn test_connect_fails_when_hello_cannot_be_sent() {
        // Arrange
        let mut transport = MockTransport::new();
        transport
            .expect_send_to()
            .times(1)
            .returning(|_, _| Err(TransportError::Closed));

        // Act
        let result = connect(transport, device(), ConnectionConfig::default()).await;

        // Assert
        assert!(matches!(result, Err(ConnectionError::Transport(TransportError::Closed))));
    }

    #[tokio::test]
    async fn test_connect_fails_when_transport_closes_during_handshake() {
        // Arrange
        let mut transport = MockTransport::new();
        transport.expect_send_to().returning(|_, _| Ok(()));
        transport
            .expect_recv_from()
            .returning(|| Err(TransportError::Closed));

        // Act
        let result = connect(transport, device(), ConnectionConfig::default()).await;

        // Assert
        assert!(matches!(result, Err(ConnectionError::Transport(TransportError::Closed))));
    }

    #[tokio::test]
    async fn test_handle_reports_task_gone_after_session_ends() {
        // Arrange – a handle whose task never existed
        let (commands, receiver) = mpsc::unbounded_channel();
        drop(receiver);
        let handle = ConnectionHandle {
            commands,
            session_id: 0x8001,
        };

        // Act
        let result = handle.send(Vec::new()).await;

        // Assert
        assert!(matches!(result, Err(ConnectionError::TaskGone)));
        assert!(matches!(handle.disconnect().await, Err(ConnectionError::TaskGone)));
    }
}
