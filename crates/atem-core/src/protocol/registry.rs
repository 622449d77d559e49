//! Title-indexed codec table.
//!
//! The registry maps each four-byte title to a pair of plain function
//! pointers, one decoding a body into an [`AtemMessage`] and one encoding it
//! back.  It is built once and never mutated afterwards, so it can be shared
//! between threads by reference without any locking; [`MessageRegistry::global`]
//! holds the standard table in a `OnceLock`.
//!
//! Titles without an entry decode to [`AtemMessage::Opaque`] and re-encode
//! byte-for-byte, which keeps a controller working against newer firmware
//! that sends messages it has never heard of.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::protocol::codec::{MessageError, Title};
use crate::protocol::fields::BodyReader;
use crate::protocol::messages::{self, AtemMessage, OpaqueMessage};

/// Codec contract for one message type.
///
/// An implementation reads and writes only the body; the 8-byte sub-header
/// is handled by the payload framing.
pub trait MessageBody: Sized {
    /// Wire tag selecting this codec.
    const TITLE: Title;

    /// Bodies shorter than this are rejected before `decode_body` runs.
    const MIN_LEN: usize;

    /// Decodes a body already known to be at least [`MIN_LEN`](Self::MIN_LEN) bytes.
    fn decode_body(reader: &BodyReader<'_>) -> Result<Self, MessageError>;

    /// Encodes the body.  Fixed-layout bodies are zero-filled to their full size.
    fn encode_body(&self) -> Vec<u8>;
}

/// Links a [`MessageBody`] type to its [`AtemMessage`] variant.
pub trait Variant: MessageBody {
    fn wrap(self) -> AtemMessage;
    fn project(message: &AtemMessage) -> Option<&Self>;
}

/// Decoder and encoder for one title.
#[derive(Clone, Copy)]
pub struct CodecEntry {
    decode: fn(&[u8]) -> Result<AtemMessage, MessageError>,
    encode: fn(&AtemMessage) -> Option<Vec<u8>>,
}

impl CodecEntry {
    /// Builds the entry for `T`.
    pub fn of<T: Variant>() -> Self {
        Self {
            decode: decode_with::<T>,
            encode: encode_with::<T>,
        }
    }
}

fn decode_with<T: Variant>(body: &[u8]) -> Result<AtemMessage, MessageError> {
    if body.len() < T::MIN_LEN {
        return Err(MessageError::TooShort {
            title: T::TITLE,
            field: "body",
            needed: T::MIN_LEN,
            available: body.len(),
        });
    }
    T::decode_body(&BodyReader::new(T::TITLE, body)).map(T::wrap)
}

fn encode_with<T: Variant>(message: &AtemMessage) -> Option<Vec<u8>> {
    T::project(message).map(T::encode_body)
}

/// Immutable title → codec table.
pub struct MessageRegistry {
    entries: HashMap<Title, CodecEntry>,
}

impl MessageRegistry {
    /// Shared registry holding every built-in message type.
    pub fn global() -> &'static MessageRegistry {
        static GLOBAL: OnceLock<MessageRegistry> = OnceLock::new();
        GLOBAL.get_or_init(Self::standard)
    }

    /// Builds a fresh registry holding every built-in message type.
    pub fn standard() -> Self {
        messages::register_standard(Self::builder()).build()
    }

    /// Starts an empty registry.  Titles left out decode as opaque.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            entries: HashMap::new(),
        }
    }

    pub fn contains(&self, title: Title) -> bool {
        self.entries.contains_key(&title)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered titles in sorted order.
    pub fn titles(&self) -> Vec<Title> {
        let mut titles: Vec<Title> = self.entries.keys().copied().collect();
        titles.sort();
        titles
    }

    /// Decodes one body.  Unregistered titles yield [`AtemMessage::Opaque`].
    ///
    /// # Errors
    ///
    /// Returns [`MessageError`] when the body fails the type's own checks.
    pub fn decode(&self, title: Title, body: &[u8]) -> Result<AtemMessage, MessageError> {
        match self.entries.get(&title) {
            Some(entry) => (entry.decode)(body),
            None => Ok(AtemMessage::Opaque(OpaqueMessage {
                title,
                body: body.to_vec(),
            })),
        }
    }

    /// Encodes the body of `message`.  Opaque messages return their stored bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Unregistered`] if this registry has no codec
    /// for a typed message.
    pub fn encode_body(&self, message: &AtemMessage) -> Result<Vec<u8>, MessageError> {
        if let AtemMessage::Opaque(opaque) = message {
            return Ok(opaque.body.clone());
        }
        let title = message.title();
        self.entries
            .get(&title)
            .and_then(|entry| (entry.encode)(message))
            .ok_or(MessageError::Unregistered(title))
    }
}

impl std::fmt::Debug for MessageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRegistry")
            .field("titles", &self.titles())
            .finish()
    }
}

/// Collects codecs before freezing them into a [`MessageRegistry`].
pub struct RegistryBuilder {
    entries: HashMap<Title, CodecEntry>,
}

impl RegistryBuilder {
    /// Adds the codec for `T`.  Each title may be registered once.
    pub fn register<T: Variant>(mut self) -> Self {
        let previous = self.entries.insert(T::TITLE, CodecEntry::of::<T>());
        debug_assert!(previous.is_none(), "codec for {} registered twice", T::TITLE);
        self
    }

    pub fn build(self) -> MessageRegistry {
        MessageRegistry {
            entries: self.entries,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
