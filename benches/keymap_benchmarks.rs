use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tilesplit::SparseKeyMap;

fn filled_map(keys: u64, stride: u64) -> SparseKeyMap {
    let mut map = SparseKeyMap::new();
    for i in 0..keys {
        map.put(i * stride, (i / 500) as u32).unwrap();
    }
    map.flush();
    map
}

fn benchmark_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("keymap_put");

    for stride in [1u64, 3, 50] {
        group.throughput(Throughput::Elements(100_000));
        group.bench_with_input(BenchmarkId::new("sequential", stride), &stride, |b, &stride| {
            b.iter(|| black_box(filled_map(100_000, stride)))
        });
    }

    group.finish();
}

fn benchmark_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("keymap_get");

    let map = filled_map(1_000_000, 3);
    map.log_stats();

    group.bench_function("sequential_hits", |b| {
        let mut key = 0u64;
        b.iter(|| {
            key = (key + 3) % 3_000_000;
            black_box(map.get(black_box(key)))
        })
    });

    group.bench_function("random_mixed", |b| {
        let mut state = 0x9E37_79B9_7F4A_7C15u64;
        b.iter(|| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            black_box(map.get(state % 3_000_000))
        })
    });

    group.finish();
}

fn benchmark_iter(c: &mut Criterion) {
    let mut group = c.benchmark_group("keymap_iter");
    group.sample_size(20);

    let mut map = filled_map(1_000_000, 3);
    group.bench_function("ascending", |b| b.iter(|| black_box(map.iter().count())));

    group.finish();
}

criterion_group!(benches, benchmark_put, benchmark_get, benchmark_iter);
criterion_main!(benches);
