//! Message framing inside a packet payload.
//!
//! A payload is a back-to-back sequence of messages, each with an 8-byte
//! sub-header:
//! ```text
//! [length:2][reserved:2][title:4][body:length-8]
//! ```
//! `length` counts the sub-header.  All multi-byte integers are big-endian.
//!
//! Framing errors (a length that runs past the payload, or one too small to
//! hold the sub-header) are fatal to the whole payload: there is no way to
//! find the next message boundary, so nothing after the fault is trusted.
//! Body errors are reported per message and never affect the neighbours.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::messages::AtemMessage;
use crate::protocol::registry::MessageRegistry;

/// Size of the per-message sub-header.
pub const MESSAGE_HEADER_SIZE: usize = 8;

/// Largest body the 16-bit length field allows.
pub const MAX_BODY_SIZE: usize = u16::MAX as usize - MESSAGE_HEADER_SIZE;

// ── Title ─────────────────────────────────────────────────────────────────────

/// Four-byte ASCII tag that selects a message codec, e.g. `PrgI`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Title([u8; 4]);

impl Title {
    /// Builds a title from a 4-byte literal: `Title::new(*b"InCm")`.
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Returns the raw tag bytes.
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.escape_ascii())
    }
}

impl fmt::Debug for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Title(\"{self}\")")
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// A single message body could not be decoded or encoded.
///
/// Every variant names the title and, where relevant, the field, so a failed
/// item can be reported without the surrounding payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MessageError {
    /// The body is shorter than the field being read.
    #[error("malformed {title} body: {field} needs {needed} bytes, body has {available}")]
    TooShort {
        title: Title,
        field: &'static str,
        needed: usize,
        available: usize,
    },

    /// A string field is not valid UTF-8.
    #[error("malformed {title} body: {field} is not valid UTF-8")]
    InvalidUtf8 { title: Title, field: &'static str },

    /// A closed enumeration holds a value outside its accepted range.
    #[error("malformed {title} body: {field} has out-of-range value {value}")]
    InvalidValue {
        title: Title,
        field: &'static str,
        value: u32,
    },

    /// An encoded body does not fit in one message.
    #[error("{title} body of {len} bytes exceeds the {MAX_BODY_SIZE}-byte limit")]
    BodyTooLarge { title: Title, len: usize },

    /// No codec for this title in the registry used to encode.
    #[error("no codec registered for {0}")]
    Unregistered(Title),
}

impl MessageError {
    /// Title of the message the error belongs to.
    pub fn title(&self) -> Title {
        match self {
            MessageError::TooShort { title, .. }
            | MessageError::InvalidUtf8 { title, .. }
            | MessageError::InvalidValue { title, .. }
            | MessageError::BodyTooLarge { title, .. } => *title,
            MessageError::Unregistered(title) => *title,
        }
    }
}

/// The payload cannot be split into messages.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FramingError {
    /// Fewer than eight bytes remain where a sub-header should start.
    #[error("payload has {remaining} stray bytes at offset {offset}")]
    TruncatedHeader { offset: usize, remaining: usize },

    /// A declared length is smaller than the sub-header itself.
    #[error("message at offset {offset} declares impossible length {declared}")]
    LengthTooSmall { offset: usize, declared: usize },

    /// A declared length runs past the end of the payload.
    #[error("message at offset {offset} declares {declared} bytes but only {remaining} remain")]
    LengthOverrun {
        offset: usize,
        declared: usize,
        remaining: usize,
    },
}

// ── Splitting ─────────────────────────────────────────────────────────────────

/// One framed message borrowed from a payload, before codec lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMessage<'a> {
    pub title: Title,
    pub body: &'a [u8],
}

/// Splits a payload into its framed messages, in payload order.
///
/// # Errors
///
/// Returns [`FramingError`] on the first framing fault; no partial result is
/// returned.
pub fn split_payload(payload: &[u8]) -> Result<Vec<RawMessage<'_>>, FramingError> {
    let mut messages = Vec::new();
    let mut offset = 0;

    while offset < payload.len() {
        let remaining = payload.len() - offset;
        if remaining < MESSAGE_HEADER_SIZE {
            return Err(FramingError::TruncatedHeader { offset, remaining });
        }

        let declared = u16::from_be_bytes([payload[offset], payload[offset + 1]]) as usize;
        if declared < MESSAGE_HEADER_SIZE {
            return Err(FramingError::LengthTooSmall { offset, declared });
        }
        if declared > remaining {
            return Err(FramingError::LengthOverrun {
                offset,
                declared,
                remaining,
            });
        }

        let title = Title::new([
            payload[offset + 4],
            payload[offset + 5],
            payload[offset + 6],
            payload[offset + 7],
        ]);
        messages.push(RawMessage {
            title,
            body: &payload[offset + MESSAGE_HEADER_SIZE..offset + declared],
        });
        offset += declared;
    }

    Ok(messages)
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Decodes every message in `payload` through `registry`.
///
/// The outer `Result` fails only on framing faults.  Each inner item is the
/// outcome for one message; unknown titles come back as
/// [`AtemMessage::Opaque`], not as errors.
///
/// # Errors
///
/// Returns [`FramingError`] if the payload cannot be split.
///
/// # Examples
///
/// ```rust
/// use atem_core::protocol::{decode_payload, encode_payload, MessageRegistry};
/// use atem_core::protocol::messages::{AtemMessage, InitiationComplete};
///
/// let registry = MessageRegistry::global();
/// let bytes = encode_payload(&[AtemMessage::from(InitiationComplete)], registry).unwrap();
/// let decoded = decode_payload(&bytes, registry).unwrap();
/// assert_eq!(decoded, vec![Ok(AtemMessage::InitiationComplete(InitiationComplete))]);
/// ```
pub fn decode_payload(
    payload: &[u8],
    registry: &MessageRegistry,
) -> Result<Vec<Result<AtemMessage, MessageError>>, FramingError> {
    let raw = split_payload(payload)?;
    Ok(raw
        .into_iter()
        .map(|m| registry.decode(m.title, m.body))
        .collect())
}

/// Encodes `messages` back-to-back into one payload.
///
/// # Errors
///
/// Returns [`MessageError`] if a message has no codec or its body is too large.
pub fn encode_payload(
    messages: &[AtemMessage],
    registry: &MessageRegistry,
) -> Result<Vec<u8>, MessageError> {
    let mut buf = Vec::new();
    for message in messages {
        let body = registry.encode_body(message)?;
        write_message(&mut buf, message.title(), &body)?;
    }
    Ok(buf)
}

/// Appends one framed message to `buf`.
///
/// # Errors
///
/// Returns [`MessageError::BodyTooLarge`] if the body does not fit the
/// 16-bit length field.
pub fn write_message(buf: &mut Vec<u8>, title: Title, body: &[u8]) -> Result<(), MessageError> {
    if body.len() > MAX_BODY_SIZE {
        return Err(MessageError::BodyTooLarge {
            title,
            len: body.len(),
        });
    }
    let length = (MESSAGE_HEADER_SIZE + body.len()) as u16;
    buf.extend_from_slice(&length.to_be_bytes());
    buf.extend_from_slice(&[0x00, 0x00]); // reserved
    buf.extend_from_slice(title.as_bytes());
    buf.extend_from_slice(body);
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
