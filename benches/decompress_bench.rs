use criterion::{black_box, criterion_group, criterion_main, Criterion};
use z64dec::codec::{decode_block, Codec, Lz4hCodec};

fn container(total: u32, blocks: &[Vec<u8>]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(b"LZ4H");
    v.extend_from_slice(&total.to_be_bytes());
    for b in blocks {
        v.extend_from_slice(&(b.len() as u32).to_be_bytes());
        v.extend_from_slice(b);
    }
    v
}

fn bench_block_decode(c: &mut Criterion) {
    let data: Vec<u8> = (0..64 * 1024u32).map(|i| (i / 32) as u8).collect();
    let comp = lz4_flex::compress(&data);
    let mut out = vec![0u8; data.len()];

    c.bench_function("block_decode_64k", |b| {
        b.iter(|| decode_block(black_box(&comp), &mut out).unwrap())
    });
}

fn bench_container_decode(c: &mut Criterion) {
    let data: Vec<u8> = (0..1024 * 1024u32).map(|i| (i / 64) as u8).collect();
    let blocks: Vec<Vec<u8>> = data.chunks(64 * 1024).map(lz4_flex::compress).collect();
    let src = container(data.len() as u32, &blocks);
    let mut out = vec![0u8; data.len()];

    c.bench_function("container_decode_1mb", |b| {
        b.iter(|| {
            let mut codec = Lz4hCodec::new();
            codec.decode(black_box(&src), &mut out).unwrap()
        })
    });
}

criterion_group!(benches, bench_block_decode, bench_container_decode);
criterion_main!(benches);
