//! Session bootstrap and teardown.
//!
//! ```text
//!            connect()            Accepted             disconnect / peer Disconnect
//!   Idle ─────────────▶ HelloSent ─────────▶ Established ──────────────────────────▶ Closed
//!                          │                                                          ▲
//!                          └──────── Rejected / attempts exhausted ───────────────────┘
//! ```
//!
//! The client picks a session id for its hello.  The device answers with a
//! packet carrying that same id in the header and the id it assigned in the
//! payload; every packet after that uses the assigned id.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::protocol::packet::{HandshakeOpcode, HandshakePayload, Packet, PacketFlags, PacketHeader};
use crate::session::SessionError;

/// Protocol version advertised in the hello.
pub const CLIENT_PROTOCOL_VERSION: (u16, u16) = (2, 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    HelloSent,
    Established,
    Closed,
}

/// Result of feeding one handshake packet to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// Not meant for this session, or not valid in the current state.
    Ignored,
    /// The device accepted; `reply` acknowledges the acceptance.
    Established { session_id: u16, reply: Packet },
    /// A repeated acceptance after establishment; the ack was probably lost.
    Reacknowledge { reply: Packet },
    /// The device refused the session.
    Rejected,
    /// The device ended the session; `reply` confirms it.
    PeerDisconnected { reply: Packet },
}

#[derive(Debug)]
pub struct Handshake {
    state: HandshakeState,
    client_session_id: u16,
    session_id: u16,
    interval: Duration,
    max_attempts: u32,
    attempts: u32,
    last_hello: Option<Instant>,
}

impl Handshake {
    pub fn new(client_session_id: u16, interval: Duration, max_attempts: u32) -> Self {
        Self {
            state: HandshakeState::Idle,
            client_session_id,
            session_id: client_session_id,
            interval,
            max_attempts,
            attempts: 0,
            last_hello: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// The id to stamp on outgoing packets: the client's own id until the
    /// device assigns one.
    pub fn session_id(&self) -> u16 {
        self.session_id
    }

    /// Sends the first hello.  Only valid from `Idle`.
    pub fn connect(&mut self, now: Instant) -> Option<Packet> {
        if self.state != HandshakeState::Idle {
            return None;
        }
        self.state = HandshakeState::HelloSent;
        self.attempts = 1;
        self.last_hello = Some(now);
        info!(client_session_id = %format!("0x{:04X}", self.client_session_id), "sending hello");
        Some(self.hello(false))
    }

    /// Resends the hello every `interval` while waiting for an answer.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::HandshakeFailed`] once `max_attempts` hellos
    /// have gone unanswered for a full interval.  The state is then `Closed`.
    pub fn poll(&mut self, now: Instant) -> Result<Option<Packet>, SessionError> {
        if self.state != HandshakeState::HelloSent {
            return Ok(None);
        }
        let due = self.last_hello.map_or(true, |sent| now.saturating_duration_since(sent) >= self.interval);
        if !due {
            return Ok(None);
        }
        if self.attempts >= self.max_attempts {
            self.state = HandshakeState::Closed;
            return Err(SessionError::HandshakeFailed {
                attempts: self.attempts,
            });
        }
        self.attempts += 1;
        self.last_hello = Some(now);
        debug!(attempt = self.attempts, "resending hello");
        Ok(Some(self.hello(true)))
    }

    /// Handles a packet carrying the HANDSHAKE flag.
    pub fn on_packet(&mut self, header: &PacketHeader, payload: &[u8]) -> HandshakeOutcome {
        let Some(body) = HandshakePayload::decode(payload) else {
            warn!(len = payload.len(), "undecodable handshake payload");
            return HandshakeOutcome::Ignored;
        };

        match (self.state, body.opcode) {
            (HandshakeState::HelloSent, HandshakeOpcode::Accepted) if header.session_id == self.client_session_id => {
                self.session_id = body.session_id;
                self.state = HandshakeState::Established;
                info!(
                    session_id = %format!("0x{:04X}", self.session_id),
                    version = %format!("{}.{}", body.version_major, body.version_minor),
                    "session established"
                );
                HandshakeOutcome::Established {
                    session_id: self.session_id,
                    reply: self.ack(),
                }
            }
            (HandshakeState::HelloSent, HandshakeOpcode::Rejected) if header.session_id == self.client_session_id => {
                self.state = HandshakeState::Closed;
                warn!("device rejected the session");
                HandshakeOutcome::Rejected
            }
            (HandshakeState::Established, HandshakeOpcode::Accepted) if body.session_id == self.session_id => {
                debug!("repeated acceptance; acknowledging again");
                HandshakeOutcome::Reacknowledge { reply: self.ack() }
            }
            (HandshakeState::Established, HandshakeOpcode::Disconnect) if header.session_id == self.session_id => {
                self.state = HandshakeState::Closed;
                info!("device closed the session");
                HandshakeOutcome::PeerDisconnected {
                    reply: self.control(HandshakeOpcode::DisconnectAck),
                }
            }
            (state, opcode) => {
                debug!(?state, ?opcode, session_id = header.session_id, "ignoring handshake packet");
                HandshakeOutcome::Ignored
            }
        }
    }

    /// Leaves the session.  Returns the Disconnect packet when one is owed.
    pub fn disconnect(&mut self) -> Option<Packet> {
        let previous = self.state;
        self.state = HandshakeState::Closed;
        match previous {
            HandshakeState::Established => Some(self.control(HandshakeOpcode::Disconnect)),
            _ => None,
        }
    }

    /// Moves to `Closed` without sending anything.
    pub fn close(&mut self) {
        self.state = HandshakeState::Closed;
    }

    fn hello(&self, is_retransmit: bool) -> Packet {
        let mut flags = PacketFlags::HANDSHAKE;
        if is_retransmit {
            flags.insert(PacketFlags::IS_RETRANSMIT);
        }
        let payload = HandshakePayload {
            opcode: HandshakeOpcode::Connect,
            session_id: self.client_session_id,
            version_major: CLIENT_PROTOCOL_VERSION.0,
            version_minor: CLIENT_PROTOCOL_VERSION.1,
        };
        Packet::new(PacketHeader::new(flags, self.client_session_id), payload.encode())
    }

    fn ack(&self) -> Packet {
        Packet::new(PacketHeader::new(PacketFlags::ACK, self.session_id), Vec::new())
    }

    fn control(&self, opcode: HandshakeOpcode) -> Packet {
        let payload = HandshakePayload {
            opcode,
            session_id: self.session_id,
            version_major: CLIENT_PROTOCOL_VERSION.0,
            version_minor: CLIENT_PROTOCOL_VERSION.1,
        };
        Packet::new(PacketHeader::new(PacketFlags::HANDSHAKE, self.session_id), payload.encode())
    }
}
