//! Criterion benchmarks for the ATEM wire codecs.
//!
//! A device sends its entire state in the first second of a session, often
//! several hundred messages spread over dozens of packets, so payload decoding
//! is the hot path.
//!
//! Run with:
//! ```bash
//! cargo bench --package atem-core --bench codec_bench
//! ```

use std::time::Instant;

use atem_core::protocol::messages::{
    ChangeKeyerDve, InitiationComplete, MediaPoolFrame, PreviewInput, ProgramInput, ProtocolVersion, TallyBySource,
    TallyEntry, TransitionPosition,
};
use atem_core::protocol::{decode_payload, encode_payload, MessageRegistry, Packet, PacketFlags, PacketHeader};
use atem_core::session::{ReliabilityConfig, ReliabilityEngine};
use atem_core::{AtemMessage, MediaPoolBank, MixEffectBlock, SequenceNumber, TallyLight, VideoSource};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn make_tally(sources: u16) -> AtemMessage {
    TallyBySource {
        entries: (1..=sources)
            .map(|n| TallyEntry {
                source: VideoSource::Input(n),
                tally: TallyLight {
                    program: n == 1,
                    preview: n == 2,
                },
            })
            .collect(),
    }
    .into()
}

/// A packet's worth of typical state-dump messages.
fn make_dump() -> Vec<AtemMessage> {
    vec![
        ProtocolVersion { major: 2, minor: 30 }.into(),
        ProgramInput {
            mix_effect: MixEffectBlock::Me1,
            source: VideoSource::Input(1),
        }
        .into(),
        PreviewInput {
            mix_effect: MixEffectBlock::Me1,
            source: VideoSource::Input(2),
        }
        .into(),
        TransitionPosition {
            mix_effect: MixEffectBlock::Me1,
            in_transition: false,
            frames_remaining: 0,
            position: 0,
        }
        .into(),
        make_tally(20),
        MediaPoolFrame {
            bank: MediaPoolBank::Still,
            frame: 0,
            is_used: true,
            hash: [0; 16],
            name: "Opener".to_string(),
        }
        .into(),
        ChangeKeyerDve {
            size_x: Some(500),
            size_y: Some(500),
            ..ChangeKeyerDve::default()
        }
        .into(),
        InitiationComplete.into(),
    ]
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

/// Benchmarks payload encoding for one message of each shape and a full dump.
fn bench_encode(c: &mut Criterion) {
    let registry = MessageRegistry::global();
    let cases: &[(&str, Vec<AtemMessage>)] = &[
        ("ProgramInput", vec![make_dump()[1].clone()]),
        ("TallyBySource20", vec![make_tally(20)]),
        ("Dump", make_dump()),
    ];

    let mut group = c.benchmark_group("encode_payload");
    for (name, messages) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), messages, |b, messages| {
            b.iter(|| encode_payload(black_box(messages), registry).expect("encode"));
        });
    }
    group.finish();
}

/// Benchmarks payload decoding through the registry.
fn bench_decode(c: &mut Criterion) {
    let registry = MessageRegistry::global();
    let dump = encode_payload(&make_dump(), registry).expect("encode");
    let tally = encode_payload(&[make_tally(40)], registry).expect("encode");

    let mut group = c.benchmark_group("decode_payload");
    group.bench_function("Dump", |b| {
        b.iter(|| decode_payload(black_box(&dump), registry).expect("decode"));
    });
    group.bench_function("TallyBySource40", |b| {
        b.iter(|| decode_payload(black_box(&tally), registry).expect("decode"));
    });
    group.finish();
}

/// Benchmarks header framing of a full datagram.
fn bench_packet(c: &mut Criterion) {
    let payload = encode_payload(&make_dump(), MessageRegistry::global()).expect("encode");
    let mut header = PacketHeader::new(PacketFlags::ACK_REQUEST | PacketFlags::ACK, 0x8001);
    header.local_sequence = SequenceNumber(1234);
    let packet = Packet::new(header, payload);
    let bytes = packet.encode().expect("encode");

    c.bench_function("packet_encode", |b| b.iter(|| black_box(&packet).encode().expect("encode")));
    c.bench_function("packet_decode", |b| b.iter(|| Packet::decode(black_box(&bytes)).expect("decode")));
}

/// Benchmarks inbound classification, the per-packet bookkeeping cost.
fn bench_classify(c: &mut Criterion) {
    c.bench_function("classify_in_order_1000", |b| {
        b.iter(|| {
            let mut engine = ReliabilityEngine::new(ReliabilityConfig::default(), 0x8001);
            let now = Instant::now();
            for seq in 1..=1000u16 {
                black_box(engine.classify(SequenceNumber(seq), now));
            }
        });
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_packet, bench_classify);
criterion_main!(benches);
