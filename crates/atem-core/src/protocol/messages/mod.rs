//! Typed ATEM messages.
//!
//! Each message type is a plain struct implementing
//! [`MessageBody`](crate::protocol::registry::MessageBody).  The
//! `atem_messages!` list below is the single place a type is named: it
//! produces the [`AtemMessage`] variant, the `From` conversion, the registry
//! glue, and the entry in the standard registry.
//!
//! Titles starting with `C` are commands (controller → device); the others
//! are state notifications (device → controller).  Both directions are
//! decodable and encodable, so the same types serve a device simulator.

use serde::{Deserialize, Serialize};

use crate::domain::{MixEffectBlock, VideoSource};
use crate::protocol::codec::{MessageError, Title};
use crate::protocol::fields::BodyReader;
use crate::protocol::registry::{MessageBody, RegistryBuilder, Variant};

pub mod initiation;
pub mod keyer;
pub mod media;
pub mod mix_effect;

pub use initiation::{InitiationComplete, ProductName, ProtocolVersion, RequestTimecode, Timecode, Topology};
pub use keyer::{
    ChangeDownstreamKeyerCutSource, ChangeDownstreamKeyerFillSource, ChangeDownstreamKeyerLive, ChangeKeyerDve,
    ChangeKeyerOnAir, DownstreamKeyerSources, DownstreamKeyerState, KeyerOnAir,
};
pub use media::{MacroAction, MediaPoolFrame};
pub use mix_effect::{
    Auto, AuxSource, ChangeAuxSource, ChangePreviewInput, ChangeProgramInput, ChangeTransitionPosition, Cut,
    PreviewInput, ProgramInput, TallyBySource, TallyEntry, TransitionPosition,
};

/// A message whose title has no codec in the registry that decoded it.
///
/// Re-encoding produces the original body byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaqueMessage {
    pub title: Title,
    pub body: Vec<u8>,
}

macro_rules! atem_messages {
    ($( $(#[$doc:meta])* $name:ident ),+ $(,)?) => {
        /// Every message the engine can carry.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub enum AtemMessage {
            $( $(#[$doc])* $name($name), )+
            /// Unregistered title, kept verbatim.
            Opaque(OpaqueMessage),
        }

        impl AtemMessage {
            /// Wire title of this message.
            pub fn title(&self) -> Title {
                match self {
                    $( AtemMessage::$name(_) => <$name as MessageBody>::TITLE, )+
                    AtemMessage::Opaque(opaque) => opaque.title,
                }
            }
        }

        $(
            impl Variant for $name {
                fn wrap(self) -> AtemMessage {
                    AtemMessage::$name(self)
                }

                fn project(message: &AtemMessage) -> Option<&Self> {
                    match message {
                        AtemMessage::$name(inner) => Some(inner),
                        _ => None,
                    }
                }
            }

            impl From<$name> for AtemMessage {
                fn from(message: $name) -> Self {
                    AtemMessage::$name(message)
                }
            }
        )+

        pub(crate) fn register_standard(builder: RegistryBuilder) -> RegistryBuilder {
            builder $( .register::<$name>() )+
        }
    };
}

atem_messages! {
    // Session initiation dump
    /// `_ver`
    ProtocolVersion,
    /// `_pin`
    ProductName,
    /// `_top`
    Topology,
    /// `InCm`
    InitiationComplete,
    /// `TiRq`
    RequestTimecode,
    /// `Time`
    Timecode,
    // Mix effects
    /// `DCut`
    Cut,
    /// `DAut`
    Auto,
    /// `CPvI`
    ChangePreviewInput,
    /// `PrvI`
    PreviewInput,
    /// `CPgI`
    ChangeProgramInput,
    /// `PrgI`
    ProgramInput,
    /// `CAuS`
    ChangeAuxSource,
    /// `AuxS`
    AuxSource,
    /// `CTPs`
    ChangeTransitionPosition,
    /// `TrPs`
    TransitionPosition,
    /// `TlSr`
    TallyBySource,
    // Keyers
    /// `CDsL`
    ChangeDownstreamKeyerLive,
    /// `DskS`
    DownstreamKeyerState,
    /// `CDsF`
    ChangeDownstreamKeyerFillSource,
    /// `CDsC`
    ChangeDownstreamKeyerCutSource,
    /// `DskB`
    DownstreamKeyerSources,
    /// `CKOn`
    ChangeKeyerOnAir,
    /// `KeOn`
    KeyerOnAir,
    /// `CKDV`
    ChangeKeyerDve,
    // Media and macros
    /// `MPfe`
    MediaPoolFrame,
    /// `MAct`
    MacroAction,
}

impl AtemMessage {
    /// Returns the inner value if this is a `T`.
    pub fn downcast_ref<T: Variant>(&self) -> Option<&T> {
        T::project(self)
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, AtemMessage::Opaque(_))
    }
}

// Field readers shared by several message layouts.

pub(crate) fn read_mix_effect(r: &BodyReader<'_>, offset: usize) -> Result<MixEffectBlock, MessageError> {
    let raw = r.u8(offset, "mix_effect")?;
    MixEffectBlock::try_from(raw).map_err(|_| r.invalid("mix_effect", raw))
}

pub(crate) fn read_source(r: &BodyReader<'_>, offset: usize, field: &'static str) -> Result<VideoSource, MessageError> {
    r.u16(offset, field).map(VideoSource::from_code)
}
