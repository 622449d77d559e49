//! One controller session with one device.
//!
//! [`Session`] ties the [`handshake`] state machine, the [`reliability`]
//! engine and the message registry together.  It performs no I/O and reads no
//! clock: the owner feeds it datagrams and timer ticks, each with the current
//! [`Instant`], and sends whatever packets come back.  Every call returns a
//! [`SessionOutput`] listing the packets to send and the events to report, in
//! order.
//!
//! Because all mutation goes through `&mut self`, the owner must serialize
//! datagram arrival and timer ticks; a single task with a `select!` loop
//! does that without any locking.

pub mod handshake;
pub mod reliability;

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::protocol::codec::{decode_payload, encode_payload, FramingError, MessageError};
use crate::protocol::messages::AtemMessage;
use crate::protocol::packet::{Packet, PacketError, PacketFlags};
use crate::protocol::registry::MessageRegistry;
use crate::protocol::sequence::SequenceNumber;

pub use handshake::{Handshake, HandshakeOutcome, HandshakeState, CLIENT_PROTOCOL_VERSION};
pub use reliability::{Classification, ReliabilityConfig, ReliabilityEngine, Unresponsive};

/// Timing and sizing for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub retransmit_timeout: Duration,
    pub max_retransmits: u32,
    pub handshake_interval: Duration,
    pub handshake_attempts: u32,
    pub duplicate_window: usize,
    pub ack_delay: Duration,
    /// Silence from an established peer longer than this ends the session.
    /// Keep it above [`SessionConfig::retry_budget`] so an unanswered packet
    /// is reported as such.
    pub peer_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retransmit_timeout: Duration::from_millis(500),
            max_retransmits: 10,
            handshake_interval: Duration::from_millis(1000),
            handshake_attempts: 5,
            duplicate_window: 64,
            ack_delay: Duration::from_millis(10),
            peer_timeout: Duration::from_millis(10_000),
        }
    }
}

impl SessionConfig {
    /// Time from the first send of a packet until its retries run out.
    pub fn retry_budget(&self) -> Duration {
        self.retransmit_timeout
            .saturating_mul(self.max_retransmits.saturating_add(1))
    }

    fn reliability(&self) -> ReliabilityConfig {
        ReliabilityConfig {
            retransmit_timeout: self.retransmit_timeout,
            max_retransmits: self.max_retransmits,
            duplicate_window: self.duplicate_window,
            ack_delay: self.ack_delay,
        }
    }
}

/// Errors surfaced by a [`Session`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("handshake failed: no answer after {attempts} attempts")]
    HandshakeFailed { attempts: u32 },

    #[error("handshake rejected by device")]
    HandshakeRejected,

    #[error("session unresponsive: {0}")]
    SessionUnresponsive(#[from] Unresponsive),

    /// A payload could not be split into messages; the session cannot
    /// resynchronise and is closed.
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] FramingError),

    #[error("session is not established")]
    NotEstablished,

    #[error("session is closed")]
    Closed,

    #[error("session already started")]
    AlreadyStarted,

    #[error("cannot encode messages: {0}")]
    Encode(#[from] MessageError),

    #[error("cannot frame packet: {0}")]
    Packet(#[from] PacketError),
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// This side called [`Session::disconnect`].
    LocalDisconnect,
    /// The device sent a Disconnect.
    PeerDisconnect,
    /// The session failed.
    Failed(SessionError),
}

/// Something the owner of a session should report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The device accepted the hello and assigned `session_id`.
    Established { session_id: u16 },
    /// The initial state dump finished (`InCm` seen).
    Connected,
    /// One decoded message, or the reason it could not be decoded.
    Message(Result<AtemMessage, MessageError>),
    Closed(CloseReason),
}

/// Packets to send and events to report after one session call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionOutput {
    pub outbound: Vec<Packet>,
    pub events: Vec<SessionEvent>,
}

impl SessionOutput {
    pub fn is_empty(&self) -> bool {
        self.outbound.is_empty() && self.events.is_empty()
    }
}

/// Sans-IO session driver.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    registry: &'static MessageRegistry,
    handshake: Handshake,
    reliability: ReliabilityEngine,
    last_heard: Option<Instant>,
    initiated: bool,
}

impl Session {
    /// Creates an idle session that will introduce itself as `client_session_id`.
    pub fn new(config: SessionConfig, client_session_id: u16) -> Self {
        Self {
            config,
            registry: MessageRegistry::global(),
            handshake: Handshake::new(client_session_id, config.handshake_interval, config.handshake_attempts),
            reliability: ReliabilityEngine::new(config.reliability(), client_session_id),
            last_heard: None,
            initiated: false,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> HandshakeState {
        self.handshake.state()
    }

    /// Current session id: the client's own until the device assigns one.
    pub fn session_id(&self) -> u16 {
        self.handshake.session_id()
    }

    /// `true` once the initial state dump has completed.
    pub fn is_initiated(&self) -> bool {
        self.initiated
    }

    pub fn reliability(&self) -> &ReliabilityEngine {
        &self.reliability
    }

    /// Starts the handshake and returns the hello packet.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyStarted`] unless the session is idle.
    pub fn connect(&mut self, now: Instant) -> Result<Packet, SessionError> {
        self.handshake.connect(now).ok_or(SessionError::AlreadyStarted)
    }

    /// Encodes `messages` into one reliable packet.
    ///
    /// The returned packet must be sent by the caller; its sequence number is
    /// in `header.local_sequence`.
    ///
    /// # Errors
    ///
    /// Fails if the session is not established, a message cannot be encoded,
    /// or the payload does not fit in one datagram.
    pub fn send(&mut self, messages: &[AtemMessage], now: Instant) -> Result<Packet, SessionError> {
        match self.handshake.state() {
            HandshakeState::Established => {}
            HandshakeState::Closed => return Err(SessionError::Closed),
            HandshakeState::Idle | HandshakeState::HelloSent => return Err(SessionError::NotEstablished),
        }
        let payload = encode_payload(messages, self.registry)?;
        Ok(self.reliability.send(payload, now)?)
    }

    /// Sequence number of a packet returned by [`send`](Self::send).
    pub fn sequence_of(packet: &Packet) -> SequenceNumber {
        packet.header.local_sequence
    }

    /// Ends the session from this side.
    ///
    /// Returns the Disconnect packet to send if the session was established.
    pub fn disconnect(&mut self) -> SessionOutput {
        let mut out = SessionOutput::default();
        if self.handshake.state() == HandshakeState::Closed {
            return out;
        }
        if let Some(packet) = self.handshake.disconnect() {
            out.outbound.push(packet);
        }
        self.reliability.reset();
        info!("session closed locally");
        out.events.push(SessionEvent::Closed(CloseReason::LocalDisconnect));
        out
    }

    /// Processes one inbound datagram.
    ///
    /// Malformed datagrams are dropped with a warning and leave the session
    /// untouched.
    pub fn receive(&mut self, datagram: &[u8], now: Instant) -> SessionOutput {
        let mut out = SessionOutput::default();

        let packet = match Packet::decode(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(error = %e, len = datagram.len(), "dropping malformed datagram");
                return out;
            }
        };
        let header = packet.header;

        match self.handshake.state() {
            HandshakeState::Idle | HandshakeState::Closed => {
                debug!(state = ?self.handshake.state(), "ignoring datagram");
                return out;
            }
            HandshakeState::HelloSent | HandshakeState::Established => {}
        }

        if header.flags.contains(PacketFlags::HANDSHAKE) {
            self.on_handshake(&packet, now, &mut out);
            return out;
        }

        if self.handshake.state() != HandshakeState::Established {
            debug!("ignoring non-handshake packet before establishment");
            return out;
        }
        if header.session_id != self.session_id() {
            debug!(session_id = header.session_id, "ignoring packet for another session");
            return out;
        }
        self.last_heard = Some(now);

        if header.flags.contains(PacketFlags::ACK) {
            self.reliability.acknowledge(header.ack_sequence);
        }
        if let Some(from) = header.retransmit_from() {
            out.outbound.extend(self.reliability.resend_from(from, now));
        }
        if header.flags.contains(PacketFlags::ACK_REQUEST)
            && self.reliability.classify(header.local_sequence, now) == Classification::Duplicate
        {
            return out;
        }

        if !packet.payload.is_empty() {
            self.deliver(&packet.payload, &mut out);
        }
        out
    }

    /// Drives timers: hello retries, retransmissions, delayed acks and the
    /// peer-silence check.
    pub fn poll(&mut self, now: Instant) -> SessionOutput {
        let mut out = SessionOutput::default();
        match self.handshake.state() {
            HandshakeState::HelloSent => match self.handshake.poll(now) {
                Ok(Some(hello)) => out.outbound.push(hello),
                Ok(None) => {}
                Err(e) => self.fail(e, &mut out),
            },
            HandshakeState::Established => self.poll_established(now, &mut out),
            HandshakeState::Idle | HandshakeState::Closed => {}
        }
        out
    }

    fn poll_established(&mut self, now: Instant, out: &mut SessionOutput) {
        if let Some(heard) = self.last_heard {
            let silent_for = now.saturating_duration_since(heard);
            if silent_for >= self.config.peer_timeout {
                self.fail(Unresponsive::PeerSilent { silent_for }.into(), out);
                return;
            }
        }
        match self.reliability.poll_retransmit(now) {
            Ok(resent) => out.outbound.extend(resent),
            Err(e) => {
                self.fail(e.into(), out);
                return;
            }
        }
        if let Some(ack) = self.reliability.poll_ack(now) {
            out.outbound.push(ack);
        }
    }

    fn on_handshake(&mut self, packet: &Packet, now: Instant, out: &mut SessionOutput) {
        match self.handshake.on_packet(&packet.header, &packet.payload) {
            HandshakeOutcome::Ignored => {}
            HandshakeOutcome::Established { session_id, reply } => {
                self.reliability.set_session_id(session_id);
                self.last_heard = Some(now);
                out.outbound.push(reply);
                out.events.push(SessionEvent::Established { session_id });
            }
            HandshakeOutcome::Reacknowledge { reply } => out.outbound.push(reply),
            HandshakeOutcome::Rejected => {
                self.fail(SessionError::HandshakeRejected, out);
            }
            HandshakeOutcome::PeerDisconnected { reply } => {
                self.reliability.reset();
                out.outbound.push(reply);
                out.events.push(SessionEvent::Closed(CloseReason::PeerDisconnect));
            }
        }
    }

    fn deliver(&mut self, payload: &[u8], out: &mut SessionOutput) {
        let items = match decode_payload(payload, self.registry) {
            Ok(items) => items,
            Err(e) => {
                self.fail(e.into(), out);
                return;
            }
        };
        for item in items {
            let completes = !self.initiated && matches!(item, Ok(AtemMessage::InitiationComplete(_)));
            if let Err(e) = &item {
                warn!(title = %e.title(), error = %e, "undecodable message");
            }
            out.events.push(SessionEvent::Message(item));
            if completes {
                self.initiated = true;
                info!("initial state dump complete");
                out.events.push(SessionEvent::Connected);
            }
        }
    }

    fn fail(&mut self, error: SessionError, out: &mut SessionOutput) {
        error!(%error, "session terminated");
        self.handshake.close();
        self.reliability.reset();
        out.events.push(SessionEvent::Closed(CloseReason::Failed(error)));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
