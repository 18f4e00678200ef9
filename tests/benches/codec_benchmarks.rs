//! # Sensor Mesh Codec Benchmarks
//!
//! | Path | Target |
//! |------|--------|
//! | Encode one frame, any layout | < 10 µs |
//! | Decode one datagram, any layout | < 10 µs |
//! | Parse one WebSocket JSON datagram | < 20 µs |
//!
//! A device streams at up to 1 kHz, so every path must stay far below 1 ms.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sm_03_source_protocol::{
    encode_bytes, parse_json_text, AbsoluteOrientation, Battery, DecoderOptions, Euler,
    FrameDecoder, SensorFrame, Vector3, WireVariant,
};
use std::time::Duration;

const T0: f64 = 1_700_000_000_000.0;

const VARIANTS: [WireVariant; 4] = [
    WireVariant::RiotRaw,
    WireVariant::RiotRawCompact,
    WireVariant::Channels,
    WireVariant::Current,
];

fn full_frame(timestamp: f64) -> SensorFrame {
    let mut frame = SensorFrame::new("riot", "0");
    frame.api = Some("v3".into());
    frame.timestamp = timestamp;
    frame.frequency = 100.0;
    frame.accelerometer = Some(Vector3::new(0.1, 0.2, 0.3));
    frame.gyroscope = Some(Vector3::new(1.0, 2.0, 3.0));
    frame.magnetometer = Some(Vector3::new(-1.0, -2.0, -3.0));
    frame.absoluteorientation = Some(AbsoluteOrientation {
        quaternion: [0.0, 0.5, 0.0, 0.5],
        euler: Euler {
            alpha: 10.0,
            beta: 20.0,
            gamma: 30.0,
        },
        sensor: Some("bno055".into()),
        ..AbsoluteOrientation::default()
    });
    frame.battery = Some(Battery {
        level: 0.5,
        ..Battery::default()
    });
    frame.set_control("switch", 1.0);
    frame
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("sm-03-encode");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(1));
    let frame = full_frame(T0);

    for variant in VARIANTS {
        group.bench_with_input(
            BenchmarkId::new("encode_bytes", format!("{variant:?}")),
            &variant,
            |b, variant| b.iter(|| black_box(encode_bytes(&frame, *variant).ok())),
        );
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("sm-03-decode");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(1));

    for variant in VARIANTS {
        // consecutive datagrams so legacy layouts always have history
        let datagrams: Vec<Vec<u8>> = (0..1000)
            .filter_map(|i| encode_bytes(&full_frame(T0 + 10.0 * i as f64), variant).ok())
            .collect();
        group.bench_with_input(
            BenchmarkId::new("decode_bytes", format!("{variant:?}")),
            &datagrams,
            |b, datagrams| {
                let mut decoder = FrameDecoder::new(DecoderOptions { bno055: true });
                let mut next = 0;
                b.iter(|| {
                    if next == 0 {
                        decoder.reset();
                    }
                    let frame = decoder.decode_bytes(&datagrams[next]).ok();
                    next = (next + 1) % datagrams.len();
                    black_box(frame)
                })
            },
        );
    }
    group.finish();
}

fn bench_json(c: &mut Criterion) {
    let mut group = c.benchmark_group("sm-03-json");
    let text = r#"{"source":"comote","id":"phone","api":"v3","timestamp":1700000000000.0,
        "frequency":60.0,"accelerometer":{"x":0.1,"y":0.2,"z":0.3},
        "gyroscope":{"x":1.0,"y":2.0,"z":3.0},"control":{"button":1.0}}"#;
    group.bench_function("parse_json_text", |b| {
        b.iter(|| black_box(parse_json_text(black_box(text)).ok()))
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_json);
criterion_main!(benches);
