//! Switcher domain values carried inside message bodies.
//!
//! These are plain value types with no wire framing of their own.  Message
//! codecs convert them to and from their numeric codes.
//!
//! # Open and closed sets (for beginners)
//!
//! Some codes belong to a set that grows with every new device model; video
//! sources are the main example.  Those types keep an `Unknown(code)` arm so
//! a controller can pass an unfamiliar source back to the device untouched.
//!
//! Other codes belong to a set fixed by the protocol (which mix-effect block,
//! which media bank).  Those types implement `TryFrom<u8>` and a decoder turns
//! an out-of-range value into a `MessageError::InvalidValue`.

pub mod switcher;
pub mod video_source;

pub use switcher::{MacroActionKind, MediaPoolBank, MixEffectBlock, TallyLight};
pub use video_source::VideoSource;
