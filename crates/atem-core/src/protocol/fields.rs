//! Fixed-offset field access for message bodies.
//!
//! Every message body is a small fixed-layout record: big-endian integers at
//! known offsets, boolean bytes, and strings that are either NUL-padded to
//! a fixed width or prefixed with a 16-bit length.  [`BodyReader`] reads those
//! fields with a bounds check that names the offending field; [`BodyWriter`]
//! fills a zeroed buffer of the final size.
//!
//! Commands that change only some properties of a device object carry a
//! [`ChangeMask`]: bit *n* says whether field *n* is present.  Unset fields
//! are left as zero bytes on the wire.

use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::protocol::codec::{MessageError, Title};

// ── Reading ───────────────────────────────────────────────────────────────────

/// Bounds-checked view over one message body.
#[derive(Debug, Clone, Copy)]
pub struct BodyReader<'a> {
    title: Title,
    body: &'a [u8],
}

impl<'a> BodyReader<'a> {
    pub fn new(title: Title, body: &'a [u8]) -> Self {
        Self { title, body }
    }

    pub fn title(&self) -> Title {
        self.title
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Returns `offset..offset + width`, or [`MessageError::TooShort`] naming `field`.
    pub fn bytes(&self, offset: usize, width: usize, field: &'static str) -> Result<&'a [u8], MessageError> {
        let end = offset.saturating_add(width);
        self.body.get(offset..end).ok_or(MessageError::TooShort {
            title: self.title,
            field,
            needed: end,
            available: self.body.len(),
        })
    }

    pub fn u8(&self, offset: usize, field: &'static str) -> Result<u8, MessageError> {
        Ok(self.bytes(offset, 1, field)?[0])
    }

    pub fn u16(&self, offset: usize, field: &'static str) -> Result<u16, MessageError> {
        let b = self.bytes(offset, 2, field)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32(&self, offset: usize, field: &'static str) -> Result<u32, MessageError> {
        let b = self.bytes(offset, 4, field)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32(&self, offset: usize, field: &'static str) -> Result<i32, MessageError> {
        let b = self.bytes(offset, 4, field)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a whole-byte boolean: only `1` is true.
    pub fn boolean(&self, offset: usize, field: &'static str) -> Result<bool, MessageError> {
        Ok(self.u8(offset, field)? == 1)
    }

    /// Reads bit `bit` (0 = least significant) of the byte at `offset`.
    pub fn flag(&self, offset: usize, bit: u8, field: &'static str) -> Result<bool, MessageError> {
        Ok(self.u8(offset, field)? & (1 << bit) != 0)
    }

    /// Reads a UTF-8 string NUL-padded to `width` bytes.
    ///
    /// The string ends at the first NUL, or at `width` if there is none.
    pub fn fixed_str(&self, offset: usize, width: usize, field: &'static str) -> Result<String, MessageError> {
        let raw = self.bytes(offset, width, field)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        self.utf8(&raw[..end], field)
    }

    /// Reads a string whose byte length is the u16 at `len_offset`; the text
    /// follows the length immediately.
    ///
    /// Returns the string and the offset just past it.
    pub fn prefixed_str(&self, len_offset: usize, field: &'static str) -> Result<(String, usize), MessageError> {
        let len = self.u16(len_offset, field)? as usize;
        let start = len_offset + 2;
        let raw = self.bytes(start, len, field)?;
        Ok((self.utf8(raw, field)?, start + len))
    }

    /// Builds an [`MessageError::InvalidValue`] for this body.
    pub fn invalid(&self, field: &'static str, value: impl Into<u32>) -> MessageError {
        MessageError::InvalidValue {
            title: self.title,
            field,
            value: value.into(),
        }
    }

    fn utf8(&self, raw: &[u8], field: &'static str) -> Result<String, MessageError> {
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| MessageError::InvalidUtf8 {
                title: self.title,
                field,
            })
    }
}

// ── Writing ───────────────────────────────────────────────────────────────────

/// Zero-filled body buffer written at fixed offsets.
///
/// Offsets past the buffer end are a programming error in the message
/// layout, not a runtime condition, so the writer indexes directly.
#[derive(Debug, Clone)]
pub struct BodyWriter {
    buf: Vec<u8>,
}

impl BodyWriter {
    /// Creates a buffer of `size` zero bytes.
    pub fn new(size: usize) -> Self {
        Self { buf: vec![0u8; size] }
    }

    pub fn put_u8(&mut self, offset: usize, value: u8) -> &mut Self {
        self.buf[offset] = value;
        self
    }

    pub fn put_u16(&mut self, offset: usize, value: u16) -> &mut Self {
        self.buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
        self
    }

    pub fn put_u32(&mut self, offset: usize, value: u32) -> &mut Self {
        self.buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
        self
    }

    pub fn put_i32(&mut self, offset: usize, value: i32) -> &mut Self {
        self.buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
        self
    }

    /// Writes `1` or `0` into the byte at `offset`.
    pub fn put_bool(&mut self, offset: usize, value: bool) -> &mut Self {
        self.buf[offset] = u8::from(value);
        self
    }

    /// Sets or clears bit `bit` of the byte at `offset`.
    pub fn put_flag(&mut self, offset: usize, bit: u8, value: bool) -> &mut Self {
        if value {
            self.buf[offset] |= 1 << bit;
        } else {
            self.buf[offset] &= !(1 << bit);
        }
        self
    }

    /// Writes `value` into a `width`-byte field, truncating at a char
    /// boundary and leaving the remainder NUL.
    pub fn put_fixed_str(&mut self, offset: usize, width: usize, value: &str) -> &mut Self {
        let mut end = value.len().min(width);
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        self.buf[offset..offset + end].copy_from_slice(&value.as_bytes()[..end]);
        self
    }

    /// Copies `bytes` in starting at `offset`.
    pub fn put_bytes(&mut self, offset: usize, bytes: &[u8]) -> &mut Self {
        self.buf[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    /// Appends bytes past the fixed part of the body.
    pub fn extend(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Returns the writer only when `bit` is set in `mask`, so a masked
    /// field can be written in one expression:
    ///
    /// ```rust
    /// use atem_core::protocol::fields::{BodyWriter, ChangeMask};
    ///
    /// let mask = ChangeMask::bit(1);
    /// let mut w = BodyWriter::new(8);
    /// if let Some(w) = w.masked(mask, 0) { w.put_u16(0, 0xFFFF); }
    /// if let Some(w) = w.masked(mask, 1) { w.put_u16(2, 0x1234); }
    /// assert_eq!(w.into_bytes(), vec![0, 0, 0x12, 0x34, 0, 0, 0, 0]);
    /// ```
    pub fn masked(&mut self, mask: ChangeMask, bit: u8) -> Option<&mut Self> {
        mask.contains_bit(bit).then_some(self)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

// ── Change mask ───────────────────────────────────────────────────────────────

/// Which optional fields a partial-update command carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeMask(pub u32);

impl ChangeMask {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Mask with only bit `n` set.
    pub const fn bit(n: u8) -> Self {
        Self(1 << n)
    }

    pub const fn contains_bit(self, n: u8) -> bool {
        self.0 & (1 << n) != 0
    }

    /// Returns the mask with bit `n` set when `present` is true.
    pub const fn with(self, n: u8, present: bool) -> Self {
        if present {
            Self(self.0 | (1 << n))
        } else {
            self
        }
    }

    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for ChangeMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
