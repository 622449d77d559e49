//! Wire protocol: packet framing, message framing and the typed message set.
//!
//! Layers from the outside in:
//!
//! - [`packet`] – the 12-byte header on every datagram.
//! - [`codec`] – splitting a packet payload into titled messages.
//! - [`registry`] – title → typed codec lookup.
//! - [`messages`] – the typed message bodies, built on [`fields`].

pub mod codec;
pub mod fields;
pub mod messages;
pub mod packet;
pub mod registry;
pub mod sequence;

pub use codec::{decode_payload, encode_payload, FramingError, MessageError, Title};
pub use messages::{AtemMessage, OpaqueMessage};
pub use packet::{
    HandshakeOpcode, HandshakePayload, Packet, PacketError, PacketFlags, PacketHeader, HEADER_SIZE,
    MAX_PACKET_SIZE, MAX_PAYLOAD_SIZE,
};
pub use registry::{MessageBody, MessageRegistry, RegistryBuilder};
pub use sequence::{SequenceCounter, SequenceNumber};
