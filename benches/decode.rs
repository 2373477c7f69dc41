//! Benchmarks for pixel decoding throughput.
//!
//! Run with: `cargo bench`
//! Compare with baseline: `cargo bench -- --save-baseline main`
//! Compare against baseline: `cargo bench -- --baseline main`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rawpump::{BitPump, BitPumpMsb, DecodeOptions, HuffmanTable, OutputPlane, RawDecoder};

const WIDTH: usize = 1400;
const HEIGHT: usize = 1024;

/// Deterministic pseudo-random bytes.
fn noise(len: usize) -> Vec<u8> {
    let mut state = 0x9E37_79B9u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

/// Minimal little-endian RW2 file with one compressed strip.
fn rw2_file(width: u16, height: u16, payload: &[u8]) -> Vec<u8> {
    let entries: [(u16, u16, u32); 3] = [(0x2, 3, width as u32), (0x3, 3, height as u32), (0x118, 4, 0)];
    let payload_at = (8 + 2 + entries.len() * 12 + 4) as u32;
    let mut out = b"IIU\0".to_vec();
    out.extend_from_slice(&8u32.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (tag, ty, value) in entries {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&ty.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        let value = if tag == 0x118 { payload_at } else { value };
        out.extend_from_slice(&value.to_le_bytes());
    }
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

fn bench_bitpump(c: &mut Criterion) {
    let data = noise(1 << 20);
    let mut group = c.benchmark_group("bitpump");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for bits in [8u32, 12, 14] {
        group.bench_with_input(BenchmarkId::new("msb", bits), &bits, |b, &bits| {
            b.iter(|| {
                let mut pump = BitPumpMsb::new(black_box(&data));
                let mut sum = 0u32;
                for _ in 0..(data.len() * 8) / bits as usize {
                    sum = sum.wrapping_add(pump.get_bits(bits).unwrap_or(0));
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

fn bench_huffman(c: &mut Criterion) {
    let mut counts = [0u8; 16];
    counts[1] = 3;
    counts[2] = 1;
    counts[3] = 2;
    let table = HuffmanTable::new(&counts, &[0, 1, 2, 3, 4, 8]).unwrap();
    let data = noise(1 << 18);

    let mut group = c.benchmark_group("huffman");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("decode_difference", |b| {
        b.iter(|| {
            let mut pump = BitPumpMsb::new(black_box(&data));
            let mut sum = 0i32;
            while !pump.is_truncated() {
                sum = sum.wrapping_add(table.decode_difference(&mut pump).unwrap_or(0));
            }
            black_box(sum)
        });
    });
    group.finish();
}

fn bench_rw2_threads(c: &mut Criterion) {
    let payload = noise(HEIGHT * (WIDTH / 14) * 16);
    let file = rw2_file(WIDTH as u16, HEIGHT as u16, &payload);
    let decoder = RawDecoder::new(&file).unwrap();

    let mut group = c.benchmark_group("rw2");
    group.throughput(Throughput::Elements((WIDTH * HEIGHT) as u64));
    group.sample_size(20);

    for threads in [1usize, 2, 4, 8] {
        let options = DecodeOptions::default().with_threads(threads);
        group.bench_with_input(BenchmarkId::new("threads", threads), &options, |b, options| {
            let mut plane = OutputPlane::new(WIDTH, HEIGHT);
            b.iter(|| black_box(decoder.decode_into(&mut plane, options).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_bitpump, bench_huffman, bench_rw2_threads);
criterion_main!(benches);
