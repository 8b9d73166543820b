//! Codec and registry benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lantern_protocol::{decode, encode, Command, FrameHeader, Registry};

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for size in [0, 3, 1000, 60000] {
        let command = Command::new(0x42, vec![0x5au8; size]).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &command, |b, command| {
            b.iter(|| black_box(encode(command)));
        });
    }

    group.finish();
}

fn bench_header_parse(c: &mut Criterion) {
    let encoded = encode(&Command::color(10, 20, 30)).freeze();

    c.bench_function("header_parse", |b| {
        b.iter(|| black_box(FrameHeader::parse(&encoded)));
    });
}

fn bench_decode_builtin(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_builtin");
    group.throughput(Throughput::Elements(1));

    let color = Bytes::from_static(&[10, 20, 30]);
    group.bench_function("color", |b| {
        b.iter(|| black_box(decode(0x20, color.clone()).unwrap()));
    });
    group.bench_function("on", |b| {
        b.iter(|| black_box(decode(0x12, Bytes::new()).unwrap()));
    });
    group.bench_function("unregistered", |b| {
        b.iter(|| black_box(decode(0x42, Bytes::new()).unwrap()));
    });

    group.finish();
}

fn bench_registry_lookup(c: &mut Criterion) {
    let registry = Registry::with_defaults();

    c.bench_function("registry_contains", |b| {
        b.iter(|| {
            for type_byte in 0..=u8::MAX {
                black_box(registry.contains(type_byte));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_encode,
    bench_header_parse,
    bench_decode_builtin,
    bench_registry_lookup,
);

criterion_main!(benches);
