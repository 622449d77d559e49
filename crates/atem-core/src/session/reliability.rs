//! Acknowledgment and retransmission.
//!
//! The engine is plain owned data with no clock and no socket of its own.
//! Callers pass `now` into every time-dependent method and put the returned
//! packets on the wire themselves, which keeps all of it testable without a
//! runtime.
//!
//! Outbound: every reliable packet gets the next local sequence number and
//! waits in the pending set until the peer acknowledges it.  Acks are
//! cumulative, so acknowledging sequence *n* also settles everything sent
//! before *n*.  Entries that stay unacknowledged are resent on a timer until
//! the retry budget runs out.
//!
//! Inbound: each sequenced packet is classified against the highest remote
//! sequence accepted so far.  A gap is delivered at once rather than held
//! back; packets that arrive after the gap has moved past them count as
//! duplicates.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::protocol::packet::{Packet, PacketError, PacketFlags, PacketHeader, MAX_PAYLOAD_SIZE, HEADER_SIZE};
use crate::protocol::sequence::{SequenceCounter, SequenceNumber};

/// Timing and sizing knobs for one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReliabilityConfig {
    pub retransmit_timeout: Duration,
    /// Resends allowed per packet before the session is declared dead.
    pub max_retransmits: u32,
    /// How many recently accepted remote sequences are remembered exactly.
    pub duplicate_window: usize,
    /// How long an owed ack may wait for an outbound packet to ride on.
    pub ack_delay: Duration,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            retransmit_timeout: Duration::from_millis(500),
            max_retransmits: 10,
            duplicate_window: 64,
            ack_delay: Duration::from_millis(10),
        }
    }
}

/// How an inbound sequenced packet relates to what was already accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Already seen.  Not delivered again, but acknowledged again.
    Duplicate,
    /// Exactly the next expected sequence.
    InOrder,
    /// Newer than expected; `missed` sequences were skipped over.
    Gap { missed: u16 },
}

/// Why the engine gave up on the peer.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum Unresponsive {
    #[error("packet {sequence} unacknowledged after {sends} sends")]
    RetriesExhausted { sequence: SequenceNumber, sends: u32 },

    #[error("no packet from peer for {silent_for:?}")]
    PeerSilent { silent_for: Duration },
}

/// An outbound packet waiting for its acknowledgment.
#[derive(Debug, Clone)]
pub struct PendingPacket {
    pub packet: Packet,
    pub sent_at: Instant,
    pub retries: u32,
}

impl PendingPacket {
    fn sequence(&self) -> SequenceNumber {
        self.packet.header.local_sequence
    }
}

/// Per-session reliability state.
#[derive(Debug)]
pub struct ReliabilityEngine {
    config: ReliabilityConfig,
    session_id: u16,
    counter: SequenceCounter,
    /// Unacknowledged packets in send order.
    pending: VecDeque<PendingPacket>,
    last_acked_local: Option<SequenceNumber>,
    last_remote: Option<SequenceNumber>,
    recent_remote: VecDeque<SequenceNumber>,
    /// Set when an ack becomes owed; cleared when one is sent.
    ack_owed_since: Option<Instant>,
}

impl ReliabilityEngine {
    pub fn new(config: ReliabilityConfig, session_id: u16) -> Self {
        Self {
            config,
            session_id,
            counter: SequenceCounter::new(),
            pending: VecDeque::new(),
            last_acked_local: None,
            last_remote: None,
            recent_remote: VecDeque::with_capacity(config.duplicate_window),
            ack_owed_since: None,
        }
    }

    /// Changes the id stamped on every packet built from now on.
    pub fn set_session_id(&mut self, session_id: u16) {
        self.session_id = session_id;
    }

    pub fn session_id(&self) -> u16 {
        self.session_id
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, sequence: SequenceNumber) -> bool {
        self.pending.iter().any(|p| p.sequence() == sequence)
    }

    /// Highest remote sequence accepted so far.
    pub fn last_remote(&self) -> Option<SequenceNumber> {
        self.last_remote
    }

    /// Highest local sequence the peer has acknowledged.
    pub fn last_acked_local(&self) -> Option<SequenceNumber> {
        self.last_acked_local
    }

    pub fn ack_owed(&self) -> bool {
        self.ack_owed_since.is_some()
    }

    /// Wraps `payload` in a reliable packet and records it as pending.
    ///
    /// Any owed acknowledgment rides along on the same packet.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::TooLarge`] if the payload does not fit one
    /// datagram.  No sequence number is consumed in that case.
    pub fn send(&mut self, payload: Vec<u8>, now: Instant) -> Result<Packet, PacketError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(PacketError::TooLarge(HEADER_SIZE + payload.len()));
        }

        let sequence = self.counter.next();
        let mut header = self.base_header(PacketFlags::ACK_REQUEST);
        header.local_sequence = sequence;
        self.piggyback_ack(&mut header);

        let packet = Packet::new(header, payload);
        self.pending.push_back(PendingPacket {
            packet: packet.clone(),
            sent_at: now,
            retries: 0,
        });
        debug!(%sequence, pending = self.pending.len(), "queued reliable packet");
        Ok(packet)
    }

    /// Applies a cumulative ack.  Returns how many pending packets it settled.
    pub fn acknowledge(&mut self, ack: SequenceNumber) -> usize {
        let before = self.pending.len();
        self.pending.retain(|p| !p.sequence().precedes_or_equals(ack));
        let settled = before - self.pending.len();

        let newer = self.last_acked_local.map_or(true, |last| last.precedes(ack));
        if newer {
            self.last_acked_local = Some(ack);
        }
        if settled > 0 {
            debug!(%ack, settled, "peer acknowledged");
        }
        settled
    }

    /// Classifies an inbound sequenced packet and schedules its ack.
    pub fn classify(&mut self, sequence: SequenceNumber, now: Instant) -> Classification {
        // Every sequenced packet is acknowledged, duplicates included, so the
        // peer stops resending.
        self.ack_owed_since.get_or_insert(now);

        let classification = match self.last_remote {
            _ if self.recent_remote.contains(&sequence) => Classification::Duplicate,
            Some(last) if sequence.precedes_or_equals(last) => Classification::Duplicate,
            Some(last) if last.next() == sequence => Classification::InOrder,
            Some(last) => Classification::Gap {
                missed: last.distance_to(sequence).wrapping_sub(1),
            },
            None => Classification::InOrder,
        };

        match classification {
            Classification::Duplicate => {
                debug!(%sequence, "duplicate packet");
            }
            Classification::InOrder => {
                debug!(%sequence, "in-order packet");
                self.accept(sequence);
            }
            Classification::Gap { missed } => {
                warn!(%sequence, missed, "sequence gap; delivering out of order");
                self.accept(sequence);
            }
        }
        classification
    }

    fn accept(&mut self, sequence: SequenceNumber) {
        self.last_remote = Some(sequence);
        if self.config.duplicate_window == 0 {
            return;
        }
        if self.recent_remote.len() == self.config.duplicate_window {
            self.recent_remote.pop_front();
        }
        self.recent_remote.push_back(sequence);
    }

    /// Resends every pending packet from `from` onward, at the peer's request.
    ///
    /// These resends do not count against the retry budget.
    pub fn resend_from(&mut self, from: SequenceNumber, now: Instant) -> Vec<Packet> {
        let resent: Vec<Packet> = self
            .pending
            .iter_mut()
            .filter(|p| from.precedes_or_equals(p.sequence()))
            .map(|p| {
                p.sent_at = now;
                p.packet.header.flags.insert(PacketFlags::IS_RETRANSMIT);
                p.packet.clone()
            })
            .collect();
        debug!(%from, count = resent.len(), "peer requested retransmission");
        resent
    }

    /// Resends pending packets whose retransmit timeout has passed.
    ///
    /// # Errors
    ///
    /// Returns [`Unresponsive::RetriesExhausted`] when a packet times out
    /// with its retry budget already spent.
    pub fn poll_retransmit(&mut self, now: Instant) -> Result<Vec<Packet>, Unresponsive> {
        let timeout = self.config.retransmit_timeout;
        let max = self.config.max_retransmits;
        let mut resent = Vec::new();

        for entry in self.pending.iter_mut() {
            if now.saturating_duration_since(entry.sent_at) < timeout {
                continue;
            }
            if entry.retries >= max {
                return Err(Unresponsive::RetriesExhausted {
                    sequence: entry.sequence(),
                    sends: entry.retries + 1,
                });
            }
            entry.retries += 1;
            entry.sent_at = now;
            entry.packet.header.flags.insert(PacketFlags::IS_RETRANSMIT);
            debug!(sequence = %entry.sequence(), retry = entry.retries, "retransmitting");
            resent.push(entry.packet.clone());
        }
        Ok(resent)
    }

    /// Returns a standalone ack once one has been owed for `ack_delay`.
    pub fn poll_ack(&mut self, now: Instant) -> Option<Packet> {
        let owed_since = self.ack_owed_since?;
        if now.saturating_duration_since(owed_since) < self.config.ack_delay {
            return None;
        }
        let mut header = self.base_header(PacketFlags::empty());
        self.piggyback_ack(&mut header);
        Some(Packet::new(header, Vec::new()))
    }

    /// Drops all pending and duplicate state.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.recent_remote.clear();
        self.last_remote = None;
        self.last_acked_local = None;
        self.ack_owed_since = None;
    }

    fn base_header(&self, flags: PacketFlags) -> PacketHeader {
        let mut header = PacketHeader::new(flags, self.session_id);
        if let Some(last) = self.last_remote {
            header.remote_sequence = last;
        }
        header
    }

    fn piggyback_ack(&mut self, header: &mut PacketHeader) {
        if self.ack_owed_since.take().is_some() {
            if let Some(last) = self.last_remote {
                header.flags.insert(PacketFlags::ACK);
                header.ack_sequence = last;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
