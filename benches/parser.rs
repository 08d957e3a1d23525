//! Parser benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rasterterm::parser::Parser;
use rasterterm::serial::{ByteSource, ScriptedStream};

fn bench_parse_plain_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");

    let plain_text = "Hello, World! ".repeat(1000);
    group.throughput(Throughput::Bytes(plain_text.len() as u64));

    group.bench_function("plain_text", |b| {
        b.iter(|| {
            let mut parser = Parser::new();
            let actions = parser.feed(black_box(plain_text.as_bytes()));
            black_box(actions)
        })
    });

    group.finish();
}

fn bench_parse_csi_sequences(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");

    // Cursor movement and erase heavy output
    let csi_heavy = "\x1b[5;10H\x1b[K\x1b[3A\x1b[12C\x1b[2J\x1bM".repeat(100);
    group.throughput(Throughput::Bytes(csi_heavy.len() as u64));

    group.bench_function("csi_sequences", |b| {
        b.iter(|| {
            let mut parser = Parser::new();
            let actions = parser.feed(black_box(csi_heavy.as_bytes()));
            black_box(actions)
        })
    });

    group.finish();
}

fn bench_parse_from_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");

    // Mid-sequence bytes pulled through the blocking read path
    let mixed = "Line 1: OK\r\n\x1b[1;1HLine 2: \x1b[0KERROR\r\n".repeat(500);
    group.throughput(Throughput::Bytes(mixed.len() as u64));

    group.bench_function("stream_advance", |b| {
        b.iter(|| {
            let mut parser = Parser::new();
            let mut stream = ScriptedStream::new(mixed.as_bytes());
            let mut count = 0usize;
            while let Some(byte) = stream.try_read_byte() {
                if parser.advance(byte, &mut stream).is_ok() {
                    count += 1;
                }
            }
            black_box(count)
        })
    });

    group.finish();
}

fn bench_parse_high_bytes(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");

    // Bytes outside 7-bit ASCII are classified and dropped
    let binary: Vec<u8> = (0u8..=255).cycle().take(64 * 1024).collect();
    group.throughput(Throughput::Bytes(binary.len() as u64));

    group.bench_function("binary_noise", |b| {
        b.iter(|| {
            let mut parser = Parser::new();
            let actions = parser.feed(black_box(&binary));
            black_box(actions)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_parse_plain_text,
    bench_parse_csi_sequences,
    bench_parse_from_stream,
    bench_parse_high_bytes
);

criterion_main!(benches);
