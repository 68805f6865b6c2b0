use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use guarded_collections::GuardedVec;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn bench_push_100k(c: &mut Criterion) {
    c.bench_function("guarded_vec::push_100k", |b| {
        b.iter_batched(
            GuardedVec::<u64>::new,
            |v| {
                for x in lcg(1).take(100_000) {
                    v.push(x).unwrap();
                }
                black_box(v)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_100k(c: &mut Criterion) {
    c.bench_function("guarded_vec::get_100k", |b| {
        let v: GuardedVec<u64> = lcg(2).take(100_000).collect();
        b.iter(|| {
            let mut sum = 0u64;
            for i in 0..100_000 {
                sum = sum.wrapping_add(v.get(i).unwrap());
            }
            black_box(sum)
        })
    });
}

fn bench_iterate_100k(c: &mut Criterion) {
    c.bench_function("guarded_vec::iter_all_100k", |b| {
        let v: GuardedVec<u64> = lcg(3).take(100_000).collect();
        b.iter(|| {
            let mut sum = 0u64;
            for x in &v {
                sum = sum.wrapping_add(x.unwrap());
            }
            black_box(sum)
        })
    });
}

fn bench_sort_100k(c: &mut Criterion) {
    c.bench_function("guarded_vec::sort_100k", |b| {
        b.iter_batched(
            || lcg(4).take(100_000).collect::<GuardedVec<u64>>(),
            |v| {
                v.sort().unwrap();
                black_box(v)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_push_100k, bench_get_100k, bench_iterate_100k, bench_sort_100k
}
criterion_main!(benches);
