//! Video source identifiers.
//!
//! Sources are 16-bit codes grouped into numeric bands (inputs below 1000,
//! colour generators at 2001+, media players at 3010+, and so on).  New
//! device models keep adding codes, so the set is open: any code outside the
//! known bands decodes to [`VideoSource::Unknown`] and encodes back unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Highest physical input number recognised by name.
pub const MAX_INPUT: u16 = 40;

/// A routable video source.
///
/// Indexed variants are 1-based, matching the numbering printed on devices.
/// Only indices inside the ranges documented on each variant are canonical:
/// `Input(0)` or `Color(5)` encode to codes that decode as a different
/// variant.  Build sources from untrusted numbers with [`VideoSource::input`]
/// or check them with [`VideoSource::is_canonical`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoSource {
    Black,
    /// Physical input 1..=40.
    Input(u16),
    ColorBars,
    /// Colour generator 1..=2.
    Color(u8),
    /// Media player fill, 1..=4.
    MediaPlayer(u8),
    /// Media player key, 1..=4.
    MediaPlayerKey(u8),
    /// Upstream key mask, 1..=16.
    KeyMask(u8),
    /// Downstream key mask, 1..=4.
    DownstreamKeyMask(u8),
    SuperSource,
    /// Clean feed 1..=2.
    CleanFeed(u8),
    /// Auxiliary output 1..=24.
    Auxiliary(u8),
    /// Program output of mix-effect block 1..=4.
    MixEffectProgram(u8),
    /// Preview output of mix-effect block 1..=4.
    MixEffectPreview(u8),
    /// Any code outside the bands above.
    Unknown(u16),
}

impl VideoSource {
    /// Maps a wire code to a source.  Never fails.
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => VideoSource::Black,
            1..=MAX_INPUT => VideoSource::Input(code),
            1000 => VideoSource::ColorBars,
            2001..=2002 => VideoSource::Color((code - 2000) as u8),
            3010..=3040 if code % 10 == 0 => VideoSource::MediaPlayer(((code - 3000) / 10) as u8),
            3011..=3041 if code % 10 == 1 => VideoSource::MediaPlayerKey(((code - 3001) / 10) as u8),
            4010..=4160 if code % 10 == 0 => VideoSource::KeyMask(((code - 4000) / 10) as u8),
            5010..=5040 if code % 10 == 0 => VideoSource::DownstreamKeyMask(((code - 5000) / 10) as u8),
            6000 => VideoSource::SuperSource,
            7001..=7002 => VideoSource::CleanFeed((code - 7000) as u8),
            8001..=8024 => VideoSource::Auxiliary((code - 8000) as u8),
            10010..=10040 if code % 10 == 0 => VideoSource::MixEffectProgram(((code - 10000) / 10) as u8),
            10011..=10041 if code % 10 == 1 => VideoSource::MixEffectPreview(((code - 10001) / 10) as u8),
            _ => VideoSource::Unknown(code),
        }
    }

    /// Physical input `n`, or `None` outside `1..=MAX_INPUT`.
    pub fn input(n: u16) -> Option<Self> {
        (1..=MAX_INPUT).contains(&n).then_some(VideoSource::Input(n))
    }

    /// Whether encoding then decoding yields this same value.
    pub fn is_canonical(self) -> bool {
        Self::from_code(self.code()) == self
    }

    /// Returns the wire code.
    pub fn code(self) -> u16 {
        match self {
            VideoSource::Black => 0,
            VideoSource::Input(n) => n,
            VideoSource::ColorBars => 1000,
            VideoSource::Color(n) => 2000 + u16::from(n),
            VideoSource::MediaPlayer(n) => 3000 + u16::from(n) * 10,
            VideoSource::MediaPlayerKey(n) => 3001 + u16::from(n) * 10,
            VideoSource::KeyMask(n) => 4000 + u16::from(n) * 10,
            VideoSource::DownstreamKeyMask(n) => 5000 + u16::from(n) * 10,
            VideoSource::SuperSource => 6000,
            VideoSource::CleanFeed(n) => 7000 + u16::from(n),
            VideoSource::Auxiliary(n) => 8000 + u16::from(n),
            VideoSource::MixEffectProgram(n) => 10000 + u16::from(n) * 10,
            VideoSource::MixEffectPreview(n) => 10001 + u16::from(n) * 10,
            VideoSource::Unknown(code) => code,
        }
    }
}

impl From<u16> for VideoSource {
    fn from(code: u16) -> Self {
        Self::from_code(code)
    }
}

impl From<VideoSource> for u16 {
    fn from(source: VideoSource) -> Self {
        source.code()
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoSource::Black => write!(f, "Black"),
            VideoSource::Input(n) => write!(f, "Input {n}"),
            VideoSource::ColorBars => write!(f, "Color Bars"),
            VideoSource::Color(n) => write!(f, "Color {n}"),
            VideoSource::MediaPlayer(n) => write!(f, "Media Player {n}"),
            VideoSource::MediaPlayerKey(n) => write!(f, "Media Player {n} Key"),
            VideoSource::KeyMask(n) => write!(f, "Key {n} Mask"),
            VideoSource::DownstreamKeyMask(n) => write!(f, "DSK {n} Mask"),
            VideoSource::SuperSource => write!(f, "SuperSource"),
            VideoSource::CleanFeed(n) => write!(f, "Clean Feed {n}"),
            VideoSource::Auxiliary(n) => write!(f, "Aux {n}"),
            VideoSource::MixEffectProgram(n) => write!(f, "ME {n} Program"),
            VideoSource::MixEffectPreview(n) => write!(f, "ME {n} Preview"),
            VideoSource::Unknown(code) => write!(f, "Source {code}"),
        }
    }
}
