use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use poolstream::{Growth, PoolConfig, PoolManager};

const PAYLOAD: usize = 256 * 1024;

fn bench_write_roundtrip(c: &mut Criterion) {
    let manager = PoolManager::new(PoolConfig::new(
        16384,
        1024 * 1024,
        8 * 1024 * 1024,
        Growth::Linear,
    ));
    let payload = vec![0xA5u8; PAYLOAD];

    let mut group = c.benchmark_group("stream");
    group.throughput(Throughput::Bytes(PAYLOAD as u64));

    group.bench_function("write_read_pooled", |b| {
        b.iter(|| {
            let mut stream = manager.stream();
            stream.write(black_box(&payload)).unwrap();
            stream.set_position(0).unwrap();
            let mut out = vec![0u8; PAYLOAD];
            let mut total = 0;
            while total < PAYLOAD {
                total += stream.read(&mut out[total..]).unwrap();
            }
            black_box(out);
        })
    });

    group.bench_function("write_make_contiguous", |b| {
        b.iter(|| {
            let mut stream = manager.stream();
            stream.write(black_box(&payload)).unwrap();
            black_box(stream.make_contiguous().unwrap().len());
        })
    });

    group.bench_function("write_read_vec_baseline", |b| {
        b.iter(|| {
            let mut buffer = Vec::new();
            buffer.extend_from_slice(black_box(&payload));
            black_box(buffer.clone());
        })
    });

    group.finish();
}

criterion_group!(benches, bench_write_roundtrip);
criterion_main!(benches);
