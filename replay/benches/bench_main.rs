use criterion::{black_box, criterion_group, criterion_main, Criterion};

use redo_replay::primitives::{read_u32, read_u64, ByteOrder};
use redo_replay::record::opcode::{OpcodeTag, VectorKind};

fn read_primitives(buf: &[u8], order: ByteOrder) -> u64 {
    let mut acc = 0u64;
    let mut offset = 0;
    while offset + 8 <= buf.len() {
        acc ^= read_u32(buf, offset, order).unwrap() as u64;
        acc ^= read_u64(buf, offset, order).unwrap_or(0);
        offset += 8;
    }
    acc
}

fn classify_all(tags: &[OpcodeTag]) -> usize {
    tags.iter().filter(|t| VectorKind::classify(**t).is_row_change()).count()
}

fn criterion_benchmark(c: &mut Criterion) {
    let buf: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();

    c.bench_function("read primitives over one block", |b| {
        b.iter(|| read_primitives(black_box(&buf), ByteOrder::Little))
    });

    let tags: Vec<OpcodeTag> = (0..1000u16)
        .map(|i| OpcodeTag { major: (i % 30) as u8, minor: (i % 13) as u8 })
        .collect();

    c.bench_function("classify 1000 opcode tags", |b| b.iter(|| classify_all(black_box(&tags))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
