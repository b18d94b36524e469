use criterion::{black_box, criterion_group, criterion_main, Criterion};
use factorkernel::codec;
use factorkernel::registry::SievePrimeRegistry;
use rug::Integer;

fn bench_encode_data(c: &mut Criterion) {
    let registry = SievePrimeRegistry::new();
    c.bench_function("encode_data", |b| {
        b.iter(|| codec::encode_data(black_box(0), black_box('x' as u64), &registry, black_box(codec::CHECKSUM_POWER)));
    });
}

fn bench_encode_text(c: &mut Criterion) {
    let registry = SievePrimeRegistry::new();
    let text = "the quick brown fox jumps over the lazy dog";
    c.bench_function("encode_text(44 chars)", |b| {
        b.iter(|| codec::encode_text(black_box(text), &registry, codec::CHECKSUM_POWER));
    });
}

fn bench_decode_chunk(c: &mut Criterion) {
    let registry = SievePrimeRegistry::new();
    let chunk = codec::encode_data(0, 'x' as u64, &registry, codec::CHECKSUM_POWER).unwrap();
    c.bench_function("decode_chunk", |b| {
        b.iter(|| codec::decode_chunk(black_box(&chunk), &registry, codec::CHECKSUM_POWER));
    });
}

fn bench_decode_text(c: &mut Criterion) {
    let registry = SievePrimeRegistry::new();
    let text = "the quick brown fox jumps over the lazy dog";
    let chunks = codec::encode_text(text, &registry, codec::CHECKSUM_POWER).unwrap();
    c.bench_function("decode_text(44 chars)", |b| {
        b.iter(|| codec::decode_text(black_box(&chunks), &registry, codec::CHECKSUM_POWER));
    });
}

fn bench_encode_operation(c: &mut Criterion) {
    let registry = SievePrimeRegistry::new();
    let opcode = Integer::from(17);
    c.bench_function("encode_operation", |b| {
        b.iter(|| codec::encode_operation(black_box(&opcode), black_box(Some(5)), &registry, codec::CHECKSUM_POWER));
    });
}

criterion_group!(
    benches,
    bench_encode_data,
    bench_encode_text,
    bench_decode_chunk,
    bench_decode_text,
    bench_encode_operation,
);
criterion_main!(benches);
