//! Messages exchanged while a session initialises.
//!
//! After the handshake the device dumps its whole state, starting with
//! `_ver`, `_pin` and `_top`, and closes the dump with `InCm`.

use serde::{Deserialize, Serialize};

use crate::protocol::codec::{MessageError, Title};
use crate::protocol::fields::{BodyReader, BodyWriter};
use crate::protocol::registry::MessageBody;

/// Firmware protocol version (`_ver`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u16,
    pub minor: u16,
}

impl MessageBody for ProtocolVersion {
    const TITLE: Title = Title::new(*b"_ver");
    const MIN_LEN: usize = 4;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            major: r.u16(0, "major")?,
            minor: r.u16(2, "minor")?,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(4);
        w.put_u16(0, self.major).put_u16(2, self.minor);
        w.into_bytes()
    }
}

/// Width of the product name field.
pub const PRODUCT_NAME_LEN: usize = 44;

/// Product model name (`_pin`), NUL-padded to 44 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductName {
    pub name: String,
}

impl MessageBody for ProductName {
    const TITLE: Title = Title::new(*b"_pin");
    const MIN_LEN: usize = PRODUCT_NAME_LEN;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            name: r.fixed_str(0, PRODUCT_NAME_LEN, "name")?,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(PRODUCT_NAME_LEN);
        w.put_fixed_str(0, PRODUCT_NAME_LEN, &self.name);
        w.into_bytes()
    }
}

/// Body size of [`Topology`].
pub const TOPOLOGY_LEN: usize = 11;

/// Resource counts of the device (`_top`).
///
/// Byte 8 and byte 10 are padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Topology {
    pub mix_effects: u8,
    pub sources: u8,
    pub color_generators: u8,
    pub auxiliaries: u8,
    pub downstream_keyers: u8,
    pub stingers: u8,
    pub dves: u8,
    pub super_sources: u8,
    pub supports_standard_definition: bool,
}

impl MessageBody for Topology {
    const TITLE: Title = Title::new(*b"_top");
    const MIN_LEN: usize = TOPOLOGY_LEN;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        Ok(Self {
            mix_effects: r.u8(0, "mix_effects")?,
            sources: r.u8(1, "sources")?,
            color_generators: r.u8(2, "color_generators")?,
            auxiliaries: r.u8(3, "auxiliaries")?,
            downstream_keyers: r.u8(4, "downstream_keyers")?,
            stingers: r.u8(5, "stingers")?,
            dves: r.u8(6, "dves")?,
            super_sources: r.u8(7, "super_sources")?,
            supports_standard_definition: r.flag(9, 0, "supports_standard_definition")?,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(TOPOLOGY_LEN);
        w.put_u8(0, self.mix_effects)
            .put_u8(1, self.sources)
            .put_u8(2, self.color_generators)
            .put_u8(3, self.auxiliaries)
            .put_u8(4, self.downstream_keyers)
            .put_u8(5, self.stingers)
            .put_u8(6, self.dves)
            .put_u8(7, self.super_sources)
            .put_flag(9, 0, self.supports_standard_definition);
        w.into_bytes()
    }
}

/// End of the initial state dump (`InCm`).  The body carries no fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiationComplete;

impl MessageBody for InitiationComplete {
    const TITLE: Title = Title::new(*b"InCm");
    const MIN_LEN: usize = 0;

    fn decode_body(_: &BodyReader<'_>) -> Result<Self, MessageError> {
        Ok(Self)
    }

    fn encode_body(&self) -> Vec<u8> {
        vec![0x01, 0x00, 0x00, 0x00]
    }
}

/// Asks the device for its current timecode (`TiRq`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTimecode;

impl MessageBody for RequestTimecode {
    const TITLE: Title = Title::new(*b"TiRq");
    const MIN_LEN: usize = 0;

    fn decode_body(_: &BodyReader<'_>) -> Result<Self, MessageError> {
        Ok(Self)
    }

    fn encode_body(&self) -> Vec<u8> {
        Vec::new()
    }
}

/// Trailing bytes the device sends after the timecode counters.
pub const TIMECODE_TRAILER: [u8; 4] = [0x00, 0x00, 0x03, 0xE8];

/// Device timecode (`Time`).
///
/// The four bytes after the counters are not interpreted.  They are kept as
/// received and written back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timecode {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    pub trailer: [u8; 4],
}

impl Timecode {
    pub fn new(hours: u8, minutes: u8, seconds: u8, frames: u8) -> Self {
        Self {
            hours,
            minutes,
            seconds,
            frames,
            trailer: TIMECODE_TRAILER,
        }
    }
}

impl MessageBody for Timecode {
    const TITLE: Title = Title::new(*b"Time");
    const MIN_LEN: usize = 4;

    fn decode_body(r: &BodyReader<'_>) -> Result<Self, MessageError> {
        // Older firmware sends only the four counters.
        let trailer = match r.bytes(4, 4, "trailer") {
            Ok(raw) => [raw[0], raw[1], raw[2], raw[3]],
            Err(_) => TIMECODE_TRAILER,
        };
        Ok(Self {
            hours: r.u8(0, "hours")?,
            minutes: r.u8(1, "minutes")?,
            seconds: r.u8(2, "seconds")?,
            frames: r.u8(3, "frames")?,
            trailer,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(8);
        w.put_u8(0, self.hours)
            .put_u8(1, self.minutes)
            .put_u8(2, self.seconds)
            .put_u8(3, self.frames)
            .put_bytes(4, &self.trailer);
        w.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader<'a>(title: Title, body: &'a [u8]) -> BodyReader<'a> {
        BodyReader::new(title, body)
    }

    #[test]
    fn test_product_name_is_nul_padded() {
        // Arrange
        let pin = ProductName {
            name: "ATEM Television Studio HD".to_string(),
        };

        // Act
        let body = pin.encode_body();

        // Assert
        assert_eq!(body.len(), PRODUCT_NAME_LEN);
        assert!(body[25..].iter().all(|&b| b == 0));
        assert_eq!(ProductName::decode_body(&reader(ProductName::TITLE, &body)).unwrap(), pin);
    }

    #[test]
    fn test_topology_decodes_fixed_offsets() {
        // Arrange – 1 M/E, 8 sources, 2 colour generators, 1 aux, 1 DSK, 0 stingers, 1 DVE, SD capable
        let body = [1, 8, 2, 1, 1, 0, 1, 0, 0, 1, 0];

        // Act
        let top = Topology::decode_body(&reader(Topology::TITLE, &body)).unwrap();

        // Assert
        assert_eq!(top.mix_effects, 1);
        assert_eq!(top.sources, 8);
        assert_eq!(top.color_generators, 2);
        assert_eq!(top.downstream_keyers, 1);
        assert_eq!(top.dves, 1);
        assert!(top.supports_standard_definition);
        assert_eq!(top.encode_body(), body.to_vec());
    }

    #[test]
    fn test_initiation_complete_ignores_body() {
        let decoded = InitiationComplete::decode_body(&reader(InitiationComplete::TITLE, &[0xFF; 4]));
        assert_eq!(decoded, Ok(InitiationComplete));
    }

    #[test]
    fn test_timecode_keeps_trailer() {
        // Arrange
        let body = [0x01, 0x02, 0x03, 0x04, 0x00, 0x00, 0x03, 0xE8];

        // Act
        let time = Timecode::decode_body(&reader(Timecode::TITLE, &body)).unwrap();

        // Assert
        assert_eq!(time, Timecode::new(1, 2, 3, 4));
        assert_eq!(time.encode_body(), body.to_vec());
    }

    #[test]
    fn test_timecode_short_form_gets_default_trailer() {
        let body = [10, 59, 30, 24];
        let time = Timecode::decode_body(&reader(Timecode::TITLE, &body)).unwrap();
        assert_eq!(time, Timecode::new(10, 59, 30, 24));
        assert_eq!(time.encode_body(), vec![10, 59, 30, 24, 0x00, 0x00, 0x03, 0xE8]);
    }
}
