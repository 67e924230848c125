// ABOUTME: Benchmark suite for frame decode/encode and serializer throughput
// ABOUTME: Measures cost across the three standard serializers and a range of payload sizes

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use forkrpc::frame::{Frame, DEFAULT_MAX_PAYLOAD_LEN};
use forkrpc::serializer::{
    JsonArraySerializer, LengthPrefixedStringsSerializer, Serializer, StructuredBinarySerializer,
};
use forkrpc::value::Value;
use std::time::Duration;

fn sample_args(size: usize) -> Vec<Value> {
    vec![
        Value::Str("echo".to_string()),
        Value::Str("A".repeat(size)),
        Value::Int(42),
    ]
}

fn bench_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");
    group.measurement_time(Duration::from_secs(10));

    let small = Frame::encode(1, b"hello", DEFAULT_MAX_PAYLOAD_LEN).unwrap();
    group.bench_function("small_payload", |b| {
        b.iter(|| {
            let mut buf = BytesMut::from(black_box(&small[..]));
            Frame::decode(&mut buf, DEFAULT_MAX_PAYLOAD_LEN).unwrap()
        })
    });

    let large_payload = vec![0u8; 64 * 1024];
    let large = Frame::encode(1, &large_payload, DEFAULT_MAX_PAYLOAD_LEN).unwrap();
    group.bench_function("64kb_payload", |b| {
        b.iter(|| {
            let mut buf = BytesMut::from(black_box(&large[..]));
            Frame::decode(&mut buf, DEFAULT_MAX_PAYLOAD_LEN).unwrap()
        })
    });

    group.finish();
}

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("small_payload", |b| {
        b.iter(|| Frame::encode(1, black_box(b"hello"), DEFAULT_MAX_PAYLOAD_LEN).unwrap())
    });

    group.finish();
}

fn bench_serializers(c: &mut Criterion) {
    let mut group = c.benchmark_group("serializer_round_trip");
    group.measurement_time(Duration::from_secs(10));

    let values = sample_args(64);

    let length_prefixed = LengthPrefixedStringsSerializer;
    group.bench_function("length_prefixed_strings", |b| {
        b.iter(|| {
            let encoded = length_prefixed.encode(black_box(&values[..2])).unwrap();
            length_prefixed.decode(&encoded).unwrap()
        })
    });

    let json = JsonArraySerializer;
    group.bench_function("json_array", |b| {
        b.iter(|| {
            let encoded = json.encode(black_box(&values)).unwrap();
            json.decode(&encoded).unwrap()
        })
    });

    let bare = StructuredBinarySerializer;
    group.bench_function("structured_binary", |b| {
        b.iter(|| {
            let encoded = bare.encode(black_box(&values)).unwrap();
            bare.decode(&encoded).unwrap()
        })
    });

    group.finish();
}

fn bench_payload_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("payload_sizes");
    group.measurement_time(Duration::from_secs(10));

    let json = JsonArraySerializer;
    for &size in &[16, 256, 4096, 65536] {
        let values = sample_args(size);
        group.bench_with_input(BenchmarkId::new("json_array_encode", size), &values, |b, values| {
            b.iter(|| json.encode(black_box(values)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_decode,
    bench_frame_encode,
    bench_serializers,
    bench_payload_sizes
);
criterion_main!(benches);
