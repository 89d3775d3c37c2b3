use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use jpeg_encoder::{ColorType, Encoder};

fn encode(width: u16, height: u16) -> Vec<u8> {
    let data = (0..usize::from(width) * usize::from(height) * 3)
        .map(|_| fastrand::u8(..))
        .collect::<Vec<_>>();
    let mut out = Vec::new();
    Encoder::new(&mut out, 90)
        .encode(&data, width, height, ColorType::Rgb)
        .unwrap();
    out
}

fn parse(c: &mut Criterion) {
    let jpeg = encode(512, 512);

    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Bytes(jpeg.len() as u64));
    group.bench_function("512x512", |b| {
        b.iter(|| {
            let document = jfif_markers::parse(black_box(&jpeg)).unwrap();
            document.segments().len()
        })
    });
    group.finish();
}

criterion_group!(benches, parse);
criterion_main!(benches);
