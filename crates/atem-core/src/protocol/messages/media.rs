//! Media pool and macro messages.

use serde::{Deserialize, Serialize};

use crate::domain::{MacroActionKind, MediaPoolBank};
use crate::protocol::codec::{MessageError, Title};
use crate::protocol::fields::{BodyReader, BodyWriter};
use crate::protocol::registry::MessageBody;

/// Offset of the name length in an `MPfe` body; the name follows it.
const FRAME_NAME_OFFSET: usize = 22;

/// Width of the content hash in an `MPfe` body.
pub const FRAME_HASH_LEN: usize = 16;

/// Description of one media pool frame (`MPfe`).
///
/// ```text
/// [bank:1][pad:1][frame:2][is_used:1][hash:16][pad:1][name_len:2][name:name_len]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPoolFrame {
    pub bank: MediaPoolBank,
    pub frame: u16,
    pub is_used: bool,
    pub hash: [u8; FRAME_HASH_LEN],
    pub name: String,
}

impl MessageBody for MediaPoolFrame {
    const TITLE: Title = Title::new(*b"MPfe");
    const MIN_LEN: usize = FRAME_NAME_OFFSET + 2;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        let raw_bank = r.u8(0, "bank")?;
        let bank = MediaPoolBank::try_from(raw_bank).map_err(|_| r.invalid("bank", raw_bank))?;
        let mut hash = [0u8; FRAME_HASH_LEN];
        hash.copy_from_slice(r.bytes(5, FRAME_HASH_LEN, "hash")?);
        let (name, _) = r.prefixed_str(FRAME_NAME_OFFSET, "name")?;
        Ok(Self {
            bank,
            frame: r.u16(2, "frame")?,
            is_used: r.boolean(4, "is_used")?,
            hash,
            name,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(FRAME_NAME_OFFSET + 2);
        w.put_u8(0, self.bank as u8)
            .put_u16(2, self.frame)
            .put_bool(4, self.is_used)
            .put_u16(FRAME_NAME_OFFSET, self.name.len() as u16)
            .extend(self.name.as_bytes());
        let mut body = w.into_bytes();
        body[5..5 + FRAME_HASH_LEN].copy_from_slice(&self.hash);
        body
    }
}

/// Runs or manages a stored macro (`MAct`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroAction {
    /// Macro slot; `0xFFFF` addresses the running macro for `Stop` and `Continue`.
    pub index: u16,
    pub action: MacroActionKind,
}

impl MessageBody for MacroAction {
    const TITLE: Title = Title::new(*b"MAct");
    const MIN_LEN: usize = 3;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        let raw = r.u8(2, "action")?;
        Ok(Self {
            index: r.u16(0, "index")?,
            action: MacroActionKind::try_from(raw).map_err(|_| r.invalid("action", raw))?,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(4);
        w.put_u16(0, self.index).put_u8(2, self.action as u8);
        w.into_bytes()
    }
}
