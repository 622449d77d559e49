//! Upstream and downstream keyer messages.

use serde::{Deserialize, Serialize};

use super::{read_mix_effect, read_source};
use crate::domain::{MixEffectBlock, VideoSource};
use crate::protocol::codec::{MessageError, Title};
use crate::protocol::fields::{BodyReader, BodyWriter, ChangeMask};
use crate::protocol::registry::MessageBody;

/// Puts a downstream keyer on or off air (`CDsL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDownstreamKeyerLive {
    pub keyer: u8,
    pub on_air: bool,
}

impl MessageBody for ChangeDownstreamKeyerLive {
    const TITLE: Title = Title::new(*b"CDsL");
    const MIN_LEN: usize = 2;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            keyer: r.u8(0, "keyer")?,
            on_air: r.boolean(1, "on_air")?,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(4);
        w.put_u8(0, self.keyer).put_bool(1, self.on_air);
        w.into_bytes()
    }
}

/// Downstream keyer state (`DskS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownstreamKeyerState {
    pub keyer: u8,
    pub on_air: bool,
    pub in_transition: bool,
    pub is_auto_transitioning: bool,
    pub frames_remaining: u8,
}

impl MessageBody for DownstreamKeyerState {
    const TITLE: Title = Title::new(*b"DskS");
    const MIN_LEN: usize = 5;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            keyer: r.u8(0, "keyer")?,
            on_air: r.boolean(1, "on_air")?,
            in_transition: r.boolean(2, "in_transition")?,
            is_auto_transitioning: r.boolean(3, "is_auto_transitioning")?,
            frames_remaining: r.u8(4, "frames_remaining")?,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(8);
        w.put_u8(0, self.keyer)
            .put_bool(1, self.on_air)
            .put_bool(2, self.in_transition)
            .put_bool(3, self.is_auto_transitioning)
            .put_u8(4, self.frames_remaining);
        w.into_bytes()
    }
}

/// Sets a downstream keyer's fill source (`CDsF`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDownstreamKeyerFillSource {
    pub keyer: u8,
    pub source: VideoSource,
}

impl MessageBody for ChangeDownstreamKeyerFillSource {
    const TITLE: Title = Title::new(*b"CDsF");
    const MIN_LEN: usize = 4;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            keyer: r.u8(0, "keyer")?,
            source: read_source(r, 2, "source")?,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(4);
        w.put_u8(0, self.keyer).put_u16(2, self.source.code());
        w.into_bytes()
    }
}

/// Sets a downstream keyer's cut (key) source (`CDsC`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDownstreamKeyerCutSource {
    pub keyer: u8,
    pub source: VideoSource,
}

impl MessageBody for ChangeDownstreamKeyerCutSource {
    const TITLE: Title = Title::new(*b"CDsC");
    const MIN_LEN: usize = 4;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            keyer: r.u8(0, "keyer")?,
            source: read_source(r, 2, "source")?,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(4);
        w.put_u8(0, self.keyer).put_u16(2, self.source.code());
        w.into_bytes()
    }
}

/// Downstream keyer fill and key sources (`DskB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownstreamKeyerSources {
    pub keyer: u8,
    pub fill: VideoSource,
    pub key: VideoSource,
}

impl MessageBody for DownstreamKeyerSources {
    const TITLE: Title = Title::new(*b"DskB");
    const MIN_LEN: usize = 6;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            keyer: r.u8(0, "keyer")?,
            fill: read_source(r, 2, "fill")?,
            key: read_source(r, 4, "key")?,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(6);
        w.put_u8(0, self.keyer)
            .put_u16(2, self.fill.code())
            .put_u16(4, self.key.code());
        w.into_bytes()
    }
}

/// Puts an upstream keyer on or off air (`CKOn`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeKeyerOnAir {
    pub mix_effect: MixEffectBlock,
    pub keyer: u8,
    pub on_air: bool,
}

impl MessageBody for ChangeKeyerOnAir {
    const TITLE: Title = Title::new(*b"CKOn");
    const MIN_LEN: usize = 3;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            mix_effect: read_mix_effect(r, 0)?,
            keyer: r.u8(1, "keyer")?,
            on_air: r.boolean(2, "on_air")?,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(4);
        w.put_u8(0, self.mix_effect as u8)
            .put_u8(1, self.keyer)
            .put_bool(2, self.on_air);
        w.into_bytes()
    }
}

/// Upstream keyer on-air state (`KeOn`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyerOnAir {
    pub mix_effect: MixEffectBlock,
    pub keyer: u8,
    pub on_air: bool,
}

impl MessageBody for KeyerOnAir {
    const TITLE: Title = Title::new(*b"KeOn");
    const MIN_LEN: usize = 3;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            mix_effect: read_mix_effect(r, 0)?,
            keyer: r.u8(1, "keyer")?,
            on_air: r.boolean(2, "on_air")?,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(4);
        w.put_u8(0, self.mix_effect as u8)
            .put_u8(1, self.keyer)
            .put_bool(2, self.on_air);
        w.into_bytes()
    }
}

/// Body size of [`ChangeKeyerDve`]; the device expects the full layout
/// even when most fields are masked out.
pub const KEYER_DVE_LEN: usize = 64;

mod dve_bit {
    pub const SIZE_X: u8 = 0;
    pub const SIZE_Y: u8 = 1;
    pub const POSITION_X: u8 = 2;
    pub const POSITION_Y: u8 = 3;
    pub const ROTATION: u8 = 4;
    /// Bits of every modelled field.
    pub const MODELLED: u32 = 0b1_1111;
}

/// Partial update of an upstream keyer's DVE transform (`CKDV`).
///
/// Only fields set to `Some` are written.  Sizes are in thousandths,
/// positions in thousandths of a screen unit, rotation in tenths of a degree.
///
/// The device defines more properties than are modelled here.  Their mask
/// bits are kept in `other_changes` and bytes 28 onwards in `other_fields`,
/// so a decoded command encodes back to the bytes it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeKeyerDve {
    pub mix_effect: MixEffectBlock,
    pub keyer: u8,
    pub size_x: Option<u32>,
    pub size_y: Option<u32>,
    pub position_x: Option<i32>,
    pub position_y: Option<i32>,
    pub rotation: Option<i32>,
    pub other_changes: ChangeMask,
    pub other_fields: Vec<u8>,
}

/// End of the modelled part of a `CKDV` body.
const KEYER_DVE_MODELLED_LEN: usize = 28;

impl Default for ChangeKeyerDve {
    fn default() -> Self {
        Self {
            mix_effect: MixEffectBlock::default(),
            keyer: 0,
            size_x: None,
            size_y: None,
            position_x: None,
            position_y: None,
            rotation: None,
            other_changes: ChangeMask::empty(),
            other_fields: vec![0; KEYER_DVE_LEN - KEYER_DVE_MODELLED_LEN],
        }
    }
}

impl ChangeKeyerDve {
    /// Change mask matching the fields that are set.
    pub fn mask(&self) -> ChangeMask {
        self.other_changes
            .with(dve_bit::SIZE_X, self.size_x.is_some())
            .with(dve_bit::SIZE_Y, self.size_y.is_some())
            .with(dve_bit::POSITION_X, self.position_x.is_some())
            .with(dve_bit::POSITION_Y, self.position_y.is_some())
            .with(dve_bit::ROTATION, self.rotation.is_some())
    }
}

impl MessageBody for ChangeKeyerDve {
    const TITLE: Title = Title::new(*b"CKDV");
    const MIN_LEN: usize = KEYER_DVE_MODELLED_LEN;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        let mask = ChangeMask(r.u32(0, "mask")?);
        let u32_if = |bit: u8, offset: usize, field: &'static str| -> Result<Option<u32>, MessageError> {
            mask.contains_bit(bit).then(|| r.u32(offset, field)).transpose()
        };
        let i32_if = |bit: u8, offset: usize, field: &'static str| -> Result<Option<i32>, MessageError> {
            mask.contains_bit(bit).then(|| r.i32(offset, field)).transpose()
        };
        let rest = r.len().saturating_sub(KEYER_DVE_MODELLED_LEN);
        Ok(Self {
            mix_effect: read_mix_effect(r, 4)?,
            keyer: r.u8(5, "keyer")?,
            size_x: u32_if(dve_bit::SIZE_X, 8, "size_x")?,
            size_y: u32_if(dve_bit::SIZE_Y, 12, "size_y")?,
            position_x: i32_if(dve_bit::POSITION_X, 16, "position_x")?,
            position_y: i32_if(dve_bit::POSITION_Y, 20, "position_y")?,
            rotation: i32_if(dve_bit::ROTATION, 24, "rotation")?,
            other_changes: ChangeMask(mask.bits() & !dve_bit::MODELLED),
            other_fields: r.bytes(KEYER_DVE_MODELLED_LEN, rest, "other_fields")?.to_vec(),
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mask = self.mask();
        let len = KEYER_DVE_LEN.max(KEYER_DVE_MODELLED_LEN + self.other_fields.len());
        let mut w = BodyWriter::new(len);
        w.put_u32(0, mask.bits()).put_u8(4, self.mix_effect as u8).put_u8(5, self.keyer);
        if let (Some(w), Some(v)) = (w.masked(mask, dve_bit::SIZE_X), self.size_x) {
            w.put_u32(8, v);
        }
        if let (Some(w), Some(v)) = (w.masked(mask, dve_bit::SIZE_Y), self.size_y) {
            w.put_u32(12, v);
        }
        if let (Some(w), Some(v)) = (w.masked(mask, dve_bit::POSITION_X), self.position_x) {
            w.put_i32(16, v);
        }
        if let (Some(w), Some(v)) = (w.masked(mask, dve_bit::POSITION_Y), self.position_y) {
            w.put_i32(20, v);
        }
        if let (Some(w), Some(v)) = (w.masked(mask, dve_bit::ROTATION), self.rotation) {
            w.put_i32(24, v);
        }
        w.put_bytes(KEYER_DVE_MODELLED_LEN, &self.other_fields);
        w.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downstream_keyer_sources_layout() {
        let dskb = DownstreamKeyerSources {
            keyer: 1,
            fill: VideoSource::MediaPlayer(1),
            key: VideoSource::MediaPlayerKey(1),
        };
        assert_eq!(dskb.encode_body(), vec![1, 0, 0x0B, 0xC2, 0x0B, 0xC3]);
    }

    #[test]
    fn test_keyer_dve_writes_only_masked_ranges() {
        // Arrange – only position_y and rotation present
        let dve = ChangeKeyerDve {
            mix_effect: MixEffectBlock::Me1,
            keyer: 1,
            position_y: Some(-500),
            rotation: Some(900),
            ..ChangeKeyerDve::default()
        };

        // Act
        let body = dve.encode_body();

        // Assert
        assert_eq!(body.len(), KEYER_DVE_LEN);
        assert_eq!(&body[0..4], &[0x00, 0x00, 0x00, 0b1_1000]);
        assert!(body[8..20].iter().all(|&b| b == 0), "size and position_x stay zero");
        assert_eq!(&body[20..24], &(-500i32).to_be_bytes());
        assert_eq!(&body[24..28], &900i32.to_be_bytes());
        assert!(body[28..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_keyer_dve_unset_bits_decode_as_none() {
        // Arrange – mask has only size_x, but the size_y bytes hold garbage
        let mut body = vec![0u8; KEYER_DVE_LEN];
        body[3] = 0b0000_0001;
        body[8..12].copy_from_slice(&250u32.to_be_bytes());
        body[12..16].copy_from_slice(&[0xFF; 4]);

        // Act
        let dve = ChangeKeyerDve::decode_body(&BodyReader::new(ChangeKeyerDve::TITLE, &body)).unwrap();

        // Assert
        assert_eq!(dve.size_x, Some(250));
        assert_eq!(dve.size_y, None);
        assert_eq!(dve.mask(), ChangeMask::bit(0));
    }

    #[test]
    fn test_keyer_dve_keeps_unmodelled_mask_bits_and_fields() {
        // Arrange – rotation plus an unmodelled property (bit 5) whose value sits past byte 28
        let mut body = vec![0u8; KEYER_DVE_LEN];
        body[3] = 0x30;
        body[24..28].copy_from_slice(&900i32.to_be_bytes());
        body[31] = 0x07;

        // Act
        let dve = ChangeKeyerDve::decode_body(&BodyReader::new(ChangeKeyerDve::TITLE, &body)).unwrap();

        // Assert
        assert_eq!(dve.rotation, Some(900));
        assert_eq!(dve.other_changes, ChangeMask::bit(5));
        assert_eq!(dve.other_fields.len(), KEYER_DVE_LEN - 28);
        assert_eq!(dve.encode_body(), body);
    }

    #[test]
    fn test_keyer_on_air_flag() {
        let body = [0x01, 0x02, 0x01, 0x00];
        let keon = KeyerOnAir::decode_body(&BodyReader::new(KeyerOnAir::TITLE, &body)).unwrap();
        assert_eq!(
            keon,
            KeyerOnAir {
                mix_effect: MixEffectBlock::Me2,
                keyer: 2,
                on_air: true
            }
        );
    }
}
