//! Closed switcher enumerations.
//!
//! Unlike video sources, these sets are fixed by the protocol itself.  A value
//! outside the accepted range means the body is corrupt or was built for a
//! different message, so decoding reports it instead of carrying it along.

use serde::{Deserialize, Serialize};

/// A mix-effect block.  Larger devices have up to four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum MixEffectBlock {
    #[default]
    Me1 = 0,
    Me2 = 1,
    Me3 = 2,
    Me4 = 3,
}

impl TryFrom<u8> for MixEffectBlock {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MixEffectBlock::Me1),
            1 => Ok(MixEffectBlock::Me2),
            2 => Ok(MixEffectBlock::Me3),
            3 => Ok(MixEffectBlock::Me4),
            _ => Err(()),
        }
    }
}

/// Media pool bank holding a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MediaPoolBank {
    Still = 0,
    Clip1 = 1,
    Clip2 = 2,
}

impl TryFrom<u8> for MediaPoolBank {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MediaPoolBank::Still),
            1 => Ok(MediaPoolBank::Clip1),
            2 => Ok(MediaPoolBank::Clip2),
            _ => Err(()),
        }
    }
}

/// What a macro control command asks the device to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MacroActionKind {
    Run = 0,
    Stop = 1,
    StopRecording = 2,
    InsertWaitForUser = 3,
    Continue = 4,
    Delete = 5,
}

impl TryFrom<u8> for MacroActionKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MacroActionKind::Run),
            1 => Ok(MacroActionKind::Stop),
            2 => Ok(MacroActionKind::StopRecording),
            3 => Ok(MacroActionKind::InsertWaitForUser),
            4 => Ok(MacroActionKind::Continue),
            5 => Ok(MacroActionKind::Delete),
            _ => Err(()),
        }
    }
}

/// Tally state of one source: bit 0 program, bit 1 preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TallyLight {
    pub program: bool,
    pub preview: bool,
}

impl TallyLight {
    const PROGRAM: u8 = 0x01;
    const PREVIEW: u8 = 0x02;

    /// Parses the tally byte.  Bits above bit 1 are rejected.
    pub fn from_bits(bits: u8) -> Result<Self, u8> {
        if bits & !(Self::PROGRAM | Self::PREVIEW) != 0 {
            return Err(bits);
        }
        Ok(Self {
            program: bits & Self::PROGRAM != 0,
            preview: bits & Self::PREVIEW != 0,
        })
    }

    pub fn bits(self) -> u8 {
        let mut bits = 0;
        if self.program {
            bits |= Self::PROGRAM;
        }
        if self.preview {
            bits |= Self::PREVIEW;
        }
        bits
    }
}
