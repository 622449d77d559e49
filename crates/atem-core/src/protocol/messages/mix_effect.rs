//! Mix-effect, auxiliary and tally messages.

use serde::{Deserialize, Serialize};

use super::{read_mix_effect, read_source};
use crate::domain::{MixEffectBlock, TallyLight, VideoSource};
use crate::protocol::codec::{MessageError, Title};
use crate::protocol::fields::{BodyReader, BodyWriter};
use crate::protocol::registry::MessageBody;

/// Performs a cut on a mix-effect block (`DCut`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cut {
    pub mix_effect: MixEffectBlock,
}

impl MessageBody for Cut {
    const TITLE: Title = Title::new(*b"DCut");
    const MIN_LEN: usize = 1;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            mix_effect: read_mix_effect(r, 0)?,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(4);
        w.put_u8(0, self.mix_effect as u8);
        w.into_bytes()
    }
}

/// Runs the selected transition on a mix-effect block (`DAut`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auto {
    pub mix_effect: MixEffectBlock,
}

impl MessageBody for Auto {
    const TITLE: Title = Title::new(*b"DAut");
    const MIN_LEN: usize = 1;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            mix_effect: read_mix_effect(r, 0)?,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(4);
        w.put_u8(0, self.mix_effect as u8);
        w.into_bytes()
    }
}

// Preview and program bus selection share one layout:
// [mix_effect:1][pad:1][source:2], padded to `size` bytes.

fn decode_bus(r: &BodyReader<'_>) -> Result<(MixEffectBlock, VideoSource), MessageError> {
    Ok((read_mix_effect(r, 0)?, read_source(r, 2, "source")?))
}

fn encode_bus(size: usize, mix_effect: MixEffectBlock, source: VideoSource) -> Vec<u8> {
    let mut w = BodyWriter::new(size);
    w.put_u8(0, mix_effect as u8).put_u16(2, source.code());
    w.into_bytes()
}

/// Selects the preview source (`CPvI`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePreviewInput {
    pub mix_effect: MixEffectBlock,
    pub source: VideoSource,
}

impl MessageBody for ChangePreviewInput {
    const TITLE: Title = Title::new(*b"CPvI");
    const MIN_LEN: usize = 4;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        let (mix_effect, source) = decode_bus(r)?;
        Ok(Self { mix_effect, source })
    }

    fn encode_body(&self) -> Vec<u8> {
        encode_bus(4, self.mix_effect, self.source)
    }
}

/// Current preview source (`PrvI`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewInput {
    pub mix_effect: MixEffectBlock,
    pub source: VideoSource,
}

impl MessageBody for PreviewInput {
    const TITLE: Title = Title::new(*b"PrvI");
    const MIN_LEN: usize = 4;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        let (mix_effect, source) = decode_bus(r)?;
        Ok(Self { mix_effect, source })
    }

    fn encode_body(&self) -> Vec<u8> {
        encode_bus(8, self.mix_effect, self.source)
    }
}

/// Selects the program source (`CPgI`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeProgramInput {
    pub mix_effect: MixEffectBlock,
    pub source: VideoSource,
}

impl MessageBody for ChangeProgramInput {
    const TITLE: Title = Title::new(*b"CPgI");
    const MIN_LEN: usize = 4;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        let (mix_effect, source) = decode_bus(r)?;
        Ok(Self { mix_effect, source })
    }

    fn encode_body(&self) -> Vec<u8> {
        encode_bus(4, self.mix_effect, self.source)
    }
}

/// Current program source (`PrgI`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramInput {
    pub mix_effect: MixEffectBlock,
    pub source: VideoSource,
}

impl MessageBody for ProgramInput {
    const TITLE: Title = Title::new(*b"PrgI");
    const MIN_LEN: usize = 4;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        let (mix_effect, source) = decode_bus(r)?;
        Ok(Self { mix_effect, source })
    }

    fn encode_body(&self) -> Vec<u8> {
        encode_bus(4, self.mix_effect, self.source)
    }
}

/// Routes a source to an auxiliary output (`CAuS`).
///
/// Byte 0 is a one-field change mask and is always 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeAuxSource {
    /// Zero-based auxiliary output.
    pub output: u8,
    pub source: VideoSource,
}

impl MessageBody for ChangeAuxSource {
    const TITLE: Title = Title::new(*b"CAuS");
    const MIN_LEN: usize = 4;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            output: r.u8(1, "output")?,
            source: read_source(r, 2, "source")?,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(4);
        w.put_u8(0, 0x01).put_u8(1, self.output).put_u16(2, self.source.code());
        w.into_bytes()
    }
}

/// Source routed to an auxiliary output (`AuxS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxSource {
    pub output: u8,
    pub source: VideoSource,
}

impl MessageBody for AuxSource {
    const TITLE: Title = Title::new(*b"AuxS");
    const MIN_LEN: usize = 4;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            output: r.u8(0, "output")?,
            source: read_source(r, 2, "source")?,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(4);
        w.put_u8(0, self.output).put_u16(2, self.source.code());
        w.into_bytes()
    }
}

/// Moves the transition lever (`CTPs`).  Position runs 0..=10000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTransitionPosition {
    pub mix_effect: MixEffectBlock,
    pub position: u16,
}

impl MessageBody for ChangeTransitionPosition {
    const TITLE: Title = Title::new(*b"CTPs");
    const MIN_LEN: usize = 4;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            mix_effect: read_mix_effect(r, 0)?,
            position: r.u16(2, "position")?,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(4);
        w.put_u8(0, self.mix_effect as u8).put_u16(2, self.position);
        w.into_bytes()
    }
}

/// Transition progress (`TrPs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPosition {
    pub mix_effect: MixEffectBlock,
    pub in_transition: bool,
    pub frames_remaining: u8,
    pub position: u16,
}

impl MessageBody for TransitionPosition {
    const TITLE: Title = Title::new(*b"TrPs");
    const MIN_LEN: usize = 6;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            mix_effect: read_mix_effect(r, 0)?,
            in_transition: r.boolean(1, "in_transition")?,
            frames_remaining: r.u8(2, "frames_remaining")?,
            position: r.u16(4, "position")?,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(8);
        w.put_u8(0, self.mix_effect as u8)
            .put_bool(1, self.in_transition)
            .put_u8(2, self.frames_remaining)
            .put_u16(4, self.position);
        w.into_bytes()
    }
}

/// One row of [`TallyBySource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyEntry {
    pub source: VideoSource,
    pub tally: TallyLight,
}

/// Tally state per source (`TlSr`).
///
/// `[count:2]` followed by `count` rows of `[source:2][tally:1]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyBySource {
    pub entries: Vec<TallyEntry>,
}

const TALLY_ROW_LEN: usize = 3;

impl MessageBody for TallyBySource {
    const TITLE: Title = Title::new(*b"TlSr");
    const MIN_LEN: usize = 2;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        let count = r.u16(0, "count")? as usize;
        let mut entries = Vec::with_capacity(count.min(r.len() / TALLY_ROW_LEN));
        for i in 0..count {
            let offset = 2 + i * TALLY_ROW_LEN;
            let source = read_source(r, offset, "source")?;
            let bits = r.u8(offset + 2, "tally")?;
            let tally = TallyLight::from_bits(bits).map_err(|raw| r.invalid("tally", raw))?;
            entries.push(TallyEntry { source, tally });
        }
        Ok(Self { entries })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(2 + self.entries.len() * TALLY_ROW_LEN);
        w.put_u16(0, self.entries.len() as u16);
        for (i, entry) in self.entries.iter().enumerate() {
            let offset = 2 + i * TALLY_ROW_LEN;
            w.put_u16(offset, entry.source.code()).put_u8(offset + 2, entry.tally.bits());
        }
        w.into_bytes()
    }
}
