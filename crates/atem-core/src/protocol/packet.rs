//! Packet framing: the 12-byte header that wraps every datagram.
//!
//! Wire format (all multi-byte integers big-endian):
//! ```text
//! [flags:5 bits | length:11 bits][session_id:2][ack_seq:2][reserved:2][remote_seq:2][local_seq:2][payload:N]
//! ```
//! `length` counts the whole datagram, header included, so one packet can
//! never exceed 2047 bytes.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::sequence::SequenceNumber;

/// Size of the packet header in bytes.
pub const HEADER_SIZE: usize = 12;

/// Largest datagram the 11-bit length field can describe.
pub const MAX_PACKET_SIZE: usize = 0x07FF;

/// Largest payload that fits in one packet.
pub const MAX_PAYLOAD_SIZE: usize = MAX_PACKET_SIZE - HEADER_SIZE;

const LENGTH_MASK: u16 = 0x07FF;
const FLAG_SHIFT: u16 = 11;

/// Errors raised while framing or parsing a packet header.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PacketError {
    /// Fewer bytes than a header.
    #[error("malformed packet: {0} bytes is shorter than the {HEADER_SIZE}-byte header")]
    Truncated(usize),

    /// The header's length field disagrees with the datagram size.
    #[error("malformed packet: header declares {declared} bytes, datagram has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// The reserved field is set on a packet that is not a retransmit request.
    #[error("malformed packet: reserved field is 0x{0:04X} without a retransmit request")]
    ReservedBitsSet(u16),

    /// The payload does not fit in the 11-bit length field.
    #[error("packet of {0} bytes exceeds the {MAX_PACKET_SIZE}-byte limit")]
    TooLarge(usize),
}

/// The five protocol flag bits carried in the top of the first header word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PacketFlags(u8);

impl PacketFlags {
    /// The sender wants this packet acknowledged; `local_sequence` is valid.
    pub const ACK_REQUEST: Self = Self(0x01);
    /// Session bootstrap/teardown packet; the payload is a handshake body.
    pub const HANDSHAKE: Self = Self(0x02);
    /// This packet is a resend of one sent earlier.
    pub const IS_RETRANSMIT: Self = Self(0x04);
    /// The sender asks for a resend starting at the `reserved` field.
    pub const RETRANSMIT_REQUEST: Self = Self(0x08);
    /// `ack_sequence` acknowledges a packet from the peer.
    pub const ACK: Self = Self(0x10);

    const ALL_BITS: u8 = 0x1F;

    /// No flags set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Builds flags from raw bits, discarding anything above bit 4.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL_BITS)
    }

    /// Returns the raw five-bit value.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` if every bit in `other` is also set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets every bit in `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clears every bit in `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for PacketFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for PacketFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(PacketFlags, &str); 5] = [
            (PacketFlags::ACK_REQUEST, "ACK_REQUEST"),
            (PacketFlags::HANDSHAKE, "HANDSHAKE"),
            (PacketFlags::IS_RETRANSMIT, "IS_RETRANSMIT"),
            (PacketFlags::RETRANSMIT_REQUEST, "RETRANSMIT_REQUEST"),
            (PacketFlags::ACK, "ACK"),
        ];
        let set: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "PacketFlags({})", set.join(" | "))
    }
}

/// Decoded packet header.  The length field is implicit in the payload size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PacketHeader {
    /// Protocol flag bits.
    pub flags: PacketFlags,
    /// Session this packet belongs to.
    pub session_id: u16,
    /// Peer sequence acknowledged by this packet; meaningful with [`PacketFlags::ACK`].
    pub ack_sequence: SequenceNumber,
    /// Zero, or the first sequence wanted when [`PacketFlags::RETRANSMIT_REQUEST`] is set.
    pub reserved: u16,
    /// Highest peer sequence the sender has accepted so far.
    pub remote_sequence: SequenceNumber,
    /// Sender's own sequence; meaningful with [`PacketFlags::ACK_REQUEST`].
    pub local_sequence: SequenceNumber,
}

impl PacketHeader {
    /// Returns a header with `flags` and `session_id` set and every other field zeroed.
    pub fn new(flags: PacketFlags, session_id: u16) -> Self {
        Self {
            flags,
            session_id,
            ..Self::default()
        }
    }

    /// Returns the first sequence the peer wants resent, if this is a retransmit request.
    pub fn retransmit_from(&self) -> Option<SequenceNumber> {
        self.flags
            .contains(PacketFlags::RETRANSMIT_REQUEST)
            .then_some(SequenceNumber(self.reserved))
    }
}

/// One datagram: header plus raw payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Creates a packet from its parts.
    pub fn new(header: PacketHeader, payload: Vec<u8>) -> Self {
        Self { header, payload }
    }

    /// Total size of the encoded datagram.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Parses one datagram.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError`] if the datagram is shorter than the header, if
    /// the declared length differs from the datagram length, or if the
    /// reserved field is set without a retransmit request.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use atem_core::protocol::{Packet, PacketFlags, PacketHeader};
    ///
    /// let packet = Packet::new(PacketHeader::new(PacketFlags::ACK, 0x8001), vec![]);
    /// let bytes = packet.encode().unwrap();
    /// assert_eq!(Packet::decode(&bytes).unwrap(), packet);
    /// ```
    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < HEADER_SIZE {
            return Err(PacketError::Truncated(bytes.len()));
        }

        let word = read_u16(bytes, 0);
        let flags = PacketFlags::from_bits_truncate((word >> FLAG_SHIFT) as u8);
        let declared = (word & LENGTH_MASK) as usize;
        if declared != bytes.len() {
            return Err(PacketError::LengthMismatch {
                declared,
                actual: bytes.len(),
            });
        }

        let reserved = read_u16(bytes, 6);
        if reserved != 0 && !flags.contains(PacketFlags::RETRANSMIT_REQUEST) {
            return Err(PacketError::ReservedBitsSet(reserved));
        }

        let header = PacketHeader {
            flags,
            session_id: read_u16(bytes, 2),
            ack_sequence: SequenceNumber(read_u16(bytes, 4)),
            reserved,
            remote_sequence: SequenceNumber(read_u16(bytes, 8)),
            local_sequence: SequenceNumber(read_u16(bytes, 10)),
        };
        Ok(Self {
            header,
            payload: bytes[HEADER_SIZE..].to_vec(),
        })
    }

    /// Encodes the packet into exactly `HEADER_SIZE + payload.len()` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::TooLarge`] if the datagram would exceed
    /// [`MAX_PACKET_SIZE`].
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let total = self.encoded_len();
        if total > MAX_PACKET_SIZE {
            return Err(PacketError::TooLarge(total));
        }

        let h = &self.header;
        let word = (u16::from(h.flags.bits()) << FLAG_SHIFT) | total as u16;

        let mut buf = Vec::with_capacity(total);
        buf.extend_from_slice(&word.to_be_bytes());
        buf.extend_from_slice(&h.session_id.to_be_bytes());
        buf.extend_from_slice(&h.ack_sequence.value().to_be_bytes());
        buf.extend_from_slice(&h.reserved.to_be_bytes());
        buf.extend_from_slice(&h.remote_sequence.value().to_be_bytes());
        buf.extend_from_slice(&h.local_sequence.value().to_be_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

// ── Handshake payload ─────────────────────────────────────────────────────────

/// Size of the payload carried by every handshake packet.
pub const HANDSHAKE_PAYLOAD_SIZE: usize = 8;

/// Opcode in byte 0 of a handshake payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HandshakeOpcode {
    /// Client asks to open a session.
    Connect = 0x01,
    /// Device accepts and assigns a session id.
    Accepted = 0x02,
    /// Device refuses (for example, all client slots in use).
    Rejected = 0x03,
    /// Either side ends the session.
    Disconnect = 0x04,
    /// Confirms a `Disconnect`.
    DisconnectAck = 0x05,
}

impl TryFrom<u8> for HandshakeOpcode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(HandshakeOpcode::Connect),
            0x02 => Ok(HandshakeOpcode::Accepted),
            0x03 => Ok(HandshakeOpcode::Rejected),
            0x04 => Ok(HandshakeOpcode::Disconnect),
            0x05 => Ok(HandshakeOpcode::DisconnectAck),
            _ => Err(()),
        }
    }
}

/// Body of a handshake packet.
///
/// ```text
/// [opcode:1][reserved:1][session_id:2][version_major:2][version_minor:2]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakePayload {
    pub opcode: HandshakeOpcode,
    /// Client-chosen id in `Connect`, device-assigned id in `Accepted`.
    pub session_id: u16,
    pub version_major: u16,
    pub version_minor: u16,
}

impl HandshakePayload {
    /// Parses a handshake body.  Returns `None` for short bodies or unknown opcodes.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() < HANDSHAKE_PAYLOAD_SIZE {
            return None;
        }
        let opcode = HandshakeOpcode::try_from(payload[0]).ok()?;
        Some(Self {
            opcode,
            session_id: read_u16(payload, 2),
            version_major: read_u16(payload, 4),
            version_minor: read_u16(payload, 6),
        })
    }

    /// Encodes the body into [`HANDSHAKE_PAYLOAD_SIZE`] bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HANDSHAKE_PAYLOAD_SIZE);
        buf.push(self.opcode as u8);
        buf.push(0x00);
        buf.extend_from_slice(&self.session_id.to_be_bytes());
        buf.extend_from_slice(&self.version_major.to_be_bytes());
        buf.extend_from_slice(&self.version_minor.to_be_bytes());
        buf
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
