//! # atem-core
//!
//! Protocol engine for the UDP control protocol spoken by ATEM video
//! switchers.
//!
//! The crate performs no I/O and reads no clock.  It has no dependency on
//! sockets or async runtimes, so every layer can be tested with plain byte
//! slices and hand-made [`std::time::Instant`]s.  The `atem-client` crate
//! wraps it in a tokio task that owns the socket.
//!
//! # Architecture overview (for beginners)
//!
//! A switcher is controlled by exchanging small UDP datagrams.  UDP may lose,
//! repeat or reorder datagrams, so the protocol adds its own session and
//! reliability layer on top:
//!
//! - **`protocol`** – How bytes look on the wire.  Each datagram has a
//!   12-byte [`Packet`] header; its payload is a run of messages, each with an
//!   8-byte sub-header carrying a four-letter [`Title`] such as `PrgI`.  The
//!   [`MessageRegistry`] maps titles to typed codecs and keeps unknown titles
//!   as opaque bytes.
//!
//! - **`session`** – The connection lifecycle.  A [`Session`] runs the
//!   handshake, numbers outgoing packets, tracks which ones the device has
//!   acknowledged, resends the rest, and filters duplicates on the way in.
//!
//! - **`domain`** – Values carried inside message bodies, such as
//!   [`VideoSource`].

pub mod domain;
pub mod protocol;
pub mod session;

pub use domain::{MacroActionKind, MediaPoolBank, MixEffectBlock, TallyLight, VideoSource};
pub use protocol::codec::{decode_payload, encode_payload, FramingError, MessageError, Title};
pub use protocol::messages::{AtemMessage, OpaqueMessage};
pub use protocol::packet::{Packet, PacketError, PacketFlags, PacketHeader};
pub use protocol::registry::MessageRegistry;
pub use protocol::sequence::SequenceNumber;
pub use session::{CloseReason, Session, SessionConfig, SessionError, SessionEvent, SessionOutput};
