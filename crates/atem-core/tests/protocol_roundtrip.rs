//! Integration tests for the atem-core wire codecs.
//!
//! These tests push every built-in message type through the public payload
//! and packet API, and check the byte-level guarantees the engine relies on:
//! unknown titles survive untouched, change masks leave unset ranges zero,
//! and one bad body never spoils its neighbours.

use atem_core::protocol::fields::ChangeMask;
use atem_core::protocol::messages::*;
use atem_core::protocol::{
    decode_payload, encode_payload, FramingError, MessageBody, MessageError, MessageRegistry, Packet, PacketFlags,
    PacketHeader, SequenceNumber, Title,
};
use atem_core::{MacroActionKind, MediaPoolBank, MixEffectBlock, TallyLight, VideoSource};

/// One value of every registered message type.
fn fixtures() -> Vec<AtemMessage> {
    vec![
        ProtocolVersion { major: 2, minor: 30 }.into(),
        ProductName {
            name: "ATEM Mini Pro".to_string(),
        }
        .into(),
        Topology {
            mix_effects: 1,
            sources: 14,
            color_generators: 2,
            auxiliaries: 1,
            downstream_keyers: 1,
            dves: 1,
            super_sources: 0,
            supports_standard_definition: false,
            ..Topology::default()
        }
        .into(),
        InitiationComplete.into(),
        RequestTimecode.into(),
        Timecode::new(1, 2, 3, 4).into(),
        Cut {
            mix_effect: MixEffectBlock::Me1,
        }
        .into(),
        Auto {
            mix_effect: MixEffectBlock::Me2,
        }
        .into(),
        ChangePreviewInput {
            mix_effect: MixEffectBlock::Me1,
            source: VideoSource::Input(2),
        }
        .into(),
        PreviewInput {
            mix_effect: MixEffectBlock::Me1,
            source: VideoSource::Color(1),
        }
        .into(),
        ChangeProgramInput {
            mix_effect: MixEffectBlock::Me1,
            source: VideoSource::MediaPlayer(1),
        }
        .into(),
        ProgramInput {
            mix_effect: MixEffectBlock::Me1,
            source: VideoSource::Unknown(12345),
        }
        .into(),
        ChangeAuxSource {
            output: 0,
            source: VideoSource::MixEffectProgram(1),
        }
        .into(),
        AuxSource {
            output: 0,
            source: VideoSource::CleanFeed(1),
        }
        .into(),
        ChangeTransitionPosition {
            mix_effect: MixEffectBlock::Me1,
            position: 5000,
        }
        .into(),
        TransitionPosition {
            mix_effect: MixEffectBlock::Me1,
            in_transition: true,
            frames_remaining: 12,
            position: 4200,
        }
        .into(),
        TallyBySource {
            entries: vec![
                TallyEntry {
                    source: VideoSource::Input(1),
                    tally: TallyLight {
                        program: true,
                        preview: false,
                    },
                },
                TallyEntry {
                    source: VideoSource::Input(2),
                    tally: TallyLight {
                        program: false,
                        preview: true,
                    },
                },
            ],
        }
        .into(),
        ChangeDownstreamKeyerLive { keyer: 0, on_air: true }.into(),
        DownstreamKeyerState {
            keyer: 0,
            on_air: true,
            in_transition: false,
            is_auto_transitioning: false,
            frames_remaining: 25,
        }
        .into(),
        ChangeDownstreamKeyerFillSource {
            keyer: 1,
            source: VideoSource::MediaPlayer(2),
        }
        .into(),
        ChangeDownstreamKeyerCutSource {
            keyer: 1,
            source: VideoSource::MediaPlayerKey(2),
        }
        .into(),
        DownstreamKeyerSources {
            keyer: 0,
            fill: VideoSource::MediaPlayer(1),
            key: VideoSource::MediaPlayerKey(1),
        }
        .into(),
        ChangeKeyerOnAir {
            mix_effect: MixEffectBlock::Me1,
            keyer: 0,
            on_air: true,
        }
        .into(),
        KeyerOnAir {
            mix_effect: MixEffectBlock::Me1,
            keyer: 0,
            on_air: false,
        }
        .into(),
        ChangeKeyerDve {
            mix_effect: MixEffectBlock::Me1,
            keyer: 0,
            size_x: Some(500),
            position_x: Some(-8000),
            ..ChangeKeyerDve::default()
        }
        .into(),
        MediaPoolFrame {
            bank: MediaPoolBank::Still,
            frame: 0,
            is_used: true,
            hash: [7; 16],
            name: "Lower third".to_string(),
        }
        .into(),
        MacroAction {
            index: 3,
            action: MacroActionKind::Run,
        }
        .into(),
    ]
}

#[test]
fn test_fixtures_cover_every_registered_title() {
    let registry = MessageRegistry::global();
    let mut titles: Vec<Title> = fixtures().iter().map(AtemMessage::title).collect();
    titles.sort();
    titles.dedup();
    assert_eq!(titles, registry.titles());
}

#[test]
fn test_encode_then_decode_is_identity_for_every_type() {
    let registry = MessageRegistry::global();
    for message in fixtures() {
        let bytes = encode_payload(std::slice::from_ref(&message), registry).expect("encode must succeed");
        let decoded = decode_payload(&bytes, registry).expect("framing must succeed");
        assert_eq!(decoded, vec![Ok(message.clone())], "round trip of {}", message.title());
    }
}

/// One body per registered title, exactly as a device lays it out.
fn canonical_bodies() -> Vec<(Title, Vec<u8>)> {
    let mut product_name = b"ATEM Mini Pro".to_vec();
    product_name.resize(44, 0);

    let mut keyer_dve = vec![0u8; 64];
    keyer_dve[3] = 0x10;
    keyer_dve[24..28].copy_from_slice(&900u32.to_be_bytes());

    let mut media_frame = vec![0x00, 0x00, 0x00, 0x03, 0x01];
    media_frame.extend_from_slice(&[0xA5; 16]);
    media_frame.extend_from_slice(&[0x00, 0x00, 0x04]);
    media_frame.extend_from_slice(b"Logo");

    let bodies: Vec<(&[u8; 4], Vec<u8>)> = vec![
        (b"_ver", vec![0x00, 0x02, 0x00, 0x1E]),
        (b"_pin", product_name),
        (b"_top", vec![1, 8, 2, 1, 1, 0, 1, 0, 0, 1, 0]),
        (b"InCm", vec![0x01, 0x00, 0x00, 0x00]),
        (b"TiRq", vec![]),
        (b"Time", vec![0x0A, 0x3B, 0x1E, 0x18, 0x00, 0x00, 0x03, 0xE8]),
        (b"DCut", vec![0x00, 0x00, 0x00, 0x00]),
        (b"DAut", vec![0x01, 0x00, 0x00, 0x00]),
        (b"CPvI", vec![0x00, 0x00, 0x00, 0x02]),
        (b"PrvI", vec![0x00, 0x00, 0x03, 0xE8, 0x00, 0x00, 0x00, 0x00]),
        (b"CPgI", vec![0x00, 0x00, 0x0B, 0xC2]),
        (b"PrgI", vec![0x00, 0x00, 0x00, 0x05]),
        (b"CAuS", vec![0x01, 0x00, 0x27, 0x1A]),
        (b"AuxS", vec![0x00, 0x00, 0x1B, 0x59]),
        (b"CTPs", vec![0x00, 0x00, 0x13, 0x88]),
        (b"TrPs", vec![0x00, 0x01, 0x0A, 0x00, 0x13, 0x88, 0x00, 0x00]),
        (b"TlSr", vec![0x00, 0x02, 0x00, 0x01, 0x01, 0x00, 0x02, 0x02]),
        (b"CDsL", vec![0x00, 0x01, 0x00, 0x00]),
        (b"DskS", vec![0x00, 0x01, 0x00, 0x00, 0x19, 0x00, 0x00, 0x00]),
        (b"CDsF", vec![0x01, 0x00, 0x0B, 0xCC]),
        (b"CDsC", vec![0x01, 0x00, 0x0B, 0xCD]),
        (b"DskB", vec![0x00, 0x00, 0x0B, 0xC2, 0x0B, 0xC3]),
        (b"CKOn", vec![0x00, 0x00, 0x01, 0x00]),
        (b"KeOn", vec![0x00, 0x01, 0x01, 0x00]),
        (b"CKDV", keyer_dve),
        (b"MPfe", media_frame),
        (b"MAct", vec![0x00, 0x02, 0x01, 0x00]),
    ];
    bodies.into_iter().map(|(title, body)| (Title::new(*title), body)).collect()
}

#[test]
fn test_canonical_bodies_cover_every_registered_title() {
    let mut titles: Vec<Title> = canonical_bodies().into_iter().map(|(title, _)| title).collect();
    titles.sort();
    assert_eq!(titles, MessageRegistry::global().titles());
}

#[test]
fn test_decode_then_encode_is_identity_for_canonical_bodies() {
    // Arrange
    let registry = MessageRegistry::global();

    for (title, body) in canonical_bodies() {
        // Act
        let message = registry
            .decode(title, &body)
            .unwrap_or_else(|e| panic!("decoding {title}: {e}"));
        let encoded = registry.encode_body(&message).expect("encode must succeed");

        // Assert
        assert_eq!(encoded, body, "re-encoding {title}");
    }
}

#[test]
fn test_unregistered_title_reencodes_byte_identically() {
    // Arrange – a payload mixing a known title with one no codec claims
    let registry = MessageRegistry::global();
    let payload: Vec<u8> = [
        &[0x00, 0x0C, 0x00, 0x00][..],
        b"PrgI",
        &[0x00, 0x00, 0x00, 0x01],
        &[0x00, 0x0E, 0x00, 0x00],
        b"FtbS",
        &[0x00, 0x01, 0x00, 0x19, 0xDE, 0xAD],
    ]
    .concat();

    // Act
    let decoded: Vec<AtemMessage> = decode_payload(&payload, registry)
        .expect("framing must succeed")
        .into_iter()
        .collect::<Result<_, _>>()
        .expect("bodies must decode");
    let reencoded = encode_payload(&decoded, registry).expect("encode must succeed");

    // Assert
    assert!(decoded[1].is_opaque());
    assert_eq!(reencoded, payload);
}

#[test]
fn test_change_mask_subset_leaves_other_ranges_zero() {
    // Arrange – only size_y (bit 1) is present
    let message: AtemMessage = ChangeKeyerDve {
        mix_effect: MixEffectBlock::Me1,
        keyer: 0,
        size_y: Some(0x0102_0304),
        ..ChangeKeyerDve::default()
    }
    .into();

    // Act
    let body = MessageRegistry::global().encode_body(&message).unwrap();

    // Assert
    assert_eq!(&body[0..4], &ChangeMask::bit(1).bits().to_be_bytes());
    assert_eq!(&body[12..16], &[0x01, 0x02, 0x03, 0x04]);
    for (offset, byte) in body.iter().enumerate() {
        if !(0..4).contains(&offset) && !(12..16).contains(&offset) {
            assert_eq!(*byte, 0, "byte {offset} must stay zero");
        }
    }
}

#[test]
fn test_body_error_is_scoped_to_one_message() {
    // Arrange – a DCut with an impossible mix-effect block between two good messages
    let registry = MessageRegistry::global();
    let payload: Vec<u8> = [
        &[0x00, 0x0C, 0x00, 0x00][..],
        b"DCut",
        &[0x00, 0x00, 0x00, 0x00],
        &[0x00, 0x0C, 0x00, 0x00],
        b"DCut",
        &[0x09, 0x00, 0x00, 0x00],
        &[0x00, 0x0C, 0x00, 0x00],
        b"DAut",
        &[0x01, 0x00, 0x00, 0x00],
    ]
    .concat();

    // Act
    let decoded = decode_payload(&payload, registry).unwrap();

    // Assert
    assert!(decoded[0].is_ok());
    assert_eq!(
        decoded[1],
        Err(MessageError::InvalidValue {
            title: Cut::TITLE,
            field: "mix_effect",
            value: 9
        })
    );
    assert_eq!(
        decoded[2],
        Ok(Auto {
            mix_effect: MixEffectBlock::Me2
        }
        .into())
    );
}

#[test]
fn test_framing_error_rejects_whole_payload() {
    let registry = MessageRegistry::global();
    let payload: Vec<u8> = [&[0x00, 0x0C, 0x00, 0x00][..], b"DCut", &[0x00, 0x00, 0x00, 0x00], &[0x00, 0x03]].concat();
    assert_eq!(
        decode_payload(&payload, registry),
        Err(FramingError::TruncatedHeader {
            offset: 12,
            remaining: 2
        })
    );
}

#[test]
fn test_messages_survive_packet_framing() {
    // Arrange
    let registry = MessageRegistry::global();
    let messages = fixtures();
    let payload = encode_payload(&messages, registry).unwrap();
    let mut header = PacketHeader::new(PacketFlags::ACK_REQUEST, 0x8003);
    header.local_sequence = SequenceNumber(42);

    // Act
    let datagram = Packet::new(header, payload).encode().unwrap();
    let packet = Packet::decode(&datagram).unwrap();
    let decoded = decode_payload(&packet.payload, registry).unwrap();

    // Assert
    assert_eq!(packet.header, header);
    let decoded: Vec<AtemMessage> = decoded.into_iter().map(Result::unwrap).collect();
    assert_eq!(decoded, messages);
}

#[test]
fn test_sequence_ordering_wraps() {
    assert!(SequenceNumber(65535).precedes(SequenceNumber(0)));
    assert!(!SequenceNumber(0).precedes(SequenceNumber(65535)));
}
