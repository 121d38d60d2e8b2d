use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lynxterm_core::{Buffer, Parser};

/// Repeat base patterns to ~64 KB for stable throughput numbers.
fn corpora() -> Vec<(&'static str, Vec<u8>)> {
    // Plain ASCII: best-case baseline.
    let ascii_line = b"The quick brown fox jumps over the lazy dog. 0123456789\r\n".as_slice();
    let ascii = ascii_line.repeat(64 * 1024 / ascii_line.len());

    // Colored compiler-style output: dense SGR switches.
    let sgr_line = b"\x1b[1;32m   Compiling\x1b[0m lynxterm-core v0.1.0\r\n\
\x1b[1;33mwarning\x1b[0m: unused variable `\x1b[1mx\x1b[0m`\r\n\
\x1b[38;5;196mE\x1b[38;2;10;20;30mrgb\x1b[0m\r\n"
        .as_slice();
    let sgr = sgr_line.repeat(64 * 1024 / sgr_line.len());

    // Cursor-heavy stream, simulating full-screen updates.
    let cursor_line = b"\x1b[1;1H\x1b[2J\x1b[1;1HABCDEFGHIJ\x1b[2;1HKLMNOPQRST\
\x1b[1;5H\x1b[0K\x1b[2;8H\x1b[1P\x1b[2;3H\x1b[2@  "
        .as_slice();
    let cursor = cursor_line.repeat(64 * 1024 / cursor_line.len());

    // Mixed multi-byte UTF-8 content.
    let utf8_line = "你好世界 café résumé 🦀 日本語テスト\r\n".as_bytes();
    let utf8 = utf8_line.repeat(64 * 1024 / utf8_line.len());

    vec![
        ("ascii_64k", ascii),
        ("sgr_64k", sgr),
        ("cursor_64k", cursor),
        ("utf8_64k", utf8),
    ]
}

fn parser_throughput_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_throughput");
    for (id, bytes) in corpora() {
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", id), &bytes, |b, bytes| {
            let buffer = Arc::new(Buffer::new(120, 40, 1000));
            let mut parser = Parser::new(Arc::clone(&buffer));
            b.iter(|| {
                parser.parse(black_box(bytes));
                black_box(buffer.cursor());
            });
        });
    }
    group.finish();
}

fn scrollback_churn_bench(c: &mut Criterion) {
    // Every line feed at the bottom evicts a row into a bounded scrollback.
    let line = b"scrollback churn line with some text on it\r\n".as_slice();
    let stream = line.repeat(16 * 1024 / line.len());

    let mut group = c.benchmark_group("scrollback_churn");
    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("parse_16k_lines", |b| {
        b.iter(|| {
            let buffer = Arc::new(Buffer::new(80, 24, 500));
            let mut parser = Parser::new(Arc::clone(&buffer));
            parser.parse(black_box(&stream));
            black_box(buffer.scrollback_len());
        });
    });
    group.finish();
}

criterion_group!(benches, parser_throughput_bench, scrollback_churn_bench);
criterion_main!(benches);
