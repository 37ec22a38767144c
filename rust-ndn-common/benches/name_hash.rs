use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_ndn_common::name::Name;

fn bench_name_hash(c: &mut Criterion) {
    let name: Name = "/ndn/edu/site/router/DV/ADV/v=12345/seg=0"
        .parse()
        .unwrap();
    c.bench_function("name_hash", |b| b.iter(|| black_box(&name).hash_u64()));
    c.bench_function("prefix_hash", |b| b.iter(|| black_box(&name).prefix_hash()));
    c.bench_function("name_encode", |b| b.iter(|| black_box(&name).bytes()));
}

criterion_group!(benches, bench_name_hash);
criterion_main!(benches);
