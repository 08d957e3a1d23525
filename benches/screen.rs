//! Screen benchmarks

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rasterterm::core::{Framebuffer, Resolution, ScreenGeometry};
use rasterterm::engine::{Engine, LinePolicy};
use rasterterm::parser::Parser;

fn framebuffer() -> Framebuffer {
    Framebuffer::with_font(Resolution::R320x240, (8, 16))
}

fn bench_screen_print(c: &mut Criterion) {
    let mut group = c.benchmark_group("screen");

    let text = "Hello, World! ".repeat(20);

    group.bench_function("print_chars", |b| {
        b.iter(|| {
            let mut fb = framebuffer();
            let geometry = ScreenGeometry::from_surface(&fb);
            let mut engine = Engine::new(&mut fb, geometry).with_settle_delay(Duration::ZERO);
            for byte in text.bytes() {
                engine.print(byte);
            }
            black_box(fb.stats())
        })
    });

    group.finish();
}

fn bench_screen_scroll(c: &mut Criterion) {
    let mut group = c.benchmark_group("screen");

    // Enough lines to scroll the 15-row screen many times
    group.bench_function("scroll", |b| {
        b.iter(|| {
            let mut fb = framebuffer();
            let geometry = ScreenGeometry::from_surface(&fb);
            let mut engine = Engine::new(&mut fb, geometry).with_settle_delay(Duration::ZERO);
            for i in 0..100 {
                engine.write_str(&format!("Line {}: Some text content here\n", i));
            }
            black_box(fb.stats())
        })
    });

    group.finish();
}

fn bench_screen_full_redraw(c: &mut Criterion) {
    let mut group = c.benchmark_group("screen");

    // Position-and-fill every row, as a full-screen application would
    let mut input = String::from("\x1b[2J");
    for row in 1..=15 {
        input.push_str(&format!("\x1b[{};1H", row));
        input.push_str(&"X".repeat(39));
    }
    group.throughput(Throughput::Bytes(input.len() as u64));

    group.bench_function("full_redraw", |b| {
        b.iter(|| {
            let mut fb = framebuffer();
            let geometry = ScreenGeometry::from_surface(&fb);
            let mut parser = Parser::new();
            let actions = parser.feed(input.as_bytes());
            let mut engine = Engine::new(&mut fb, geometry).with_settle_delay(Duration::ZERO);
            for action in actions {
                engine.apply(action, LinePolicy::default());
            }
            black_box(fb.stats())
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_screen_print,
    bench_screen_scroll,
    bench_screen_full_redraw
);

criterion_main!(benches);
