use criterion::{black_box, criterion_group, criterion_main, Criterion};
use blitzkit::payload;
fn bench_payload(c: &mut Criterion) {
    let data = vec![0u8; 1024 * 1024];
    let mut region = Vec::new();
    payload::encode(&mut region, &data).unwrap();
    c.bench_function("payload_encode_1mb", |b| b.iter(|| {
        let mut out = Vec::new();
        payload::encode(&mut out, black_box(&data)).unwrap();
        out
    }));
    c.bench_function("payload_decode_1mb", |b| b.iter(|| payload::decode(black_box(region.as_slice())).unwrap()));
}
criterion_group!(benches, bench_payload);
criterion_main!(benches);
