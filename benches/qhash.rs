use criterion::Criterion;
use criterion::Throughput;
use criterion::{criterion_group, criterion_main};
use qhash::{MurmurHasher, QMapU64};
use rand::{thread_rng, Rng};
use std::hash::BuildHasherDefault;

const NUM_KEYS: u32 = 1 << 14;
const NUM_OPS: u64 = 1_000_000;

fn bench_qmap(c: &mut Criterion) {
    let mut group = c.benchmark_group("qmap");
    group.throughput(Throughput::Elements(NUM_OPS * 6));
    group.sample_size(10);
    group.bench_function("insert_and_remove", |b| {
        let mut map = QMapU64::<u64>::with_min_size(NUM_KEYS);

        let mut rng = thread_rng();
        let mut bits: u64 = rng.gen();
        let mut mask = 0u64;

        b.iter(|| {
            for _ in 0..6 {
                // Add 4 random bits
                mask <<= 4;
                mask |= bits & 0b00001111;
                bits >>= 4;

                for i in 0..NUM_OPS {
                    let key: u64 = rng.gen::<u64>() & mask;
                    map.insert(key, i);
                    let key: u64 = rng.gen::<u64>() & mask;
                    map.remove(&key);
                }
            }
        })
    });
    group.bench_function("sealed_lookup", |b| {
        let mut map = QMapU64::<u64>::new();
        for key in 0..NUM_KEYS as u64 {
            map.insert(key * 3, key);
        }
        map.seal();

        let mut rng = thread_rng();
        b.iter(|| {
            let mut found = 0u64;
            for _ in 0..NUM_OPS * 6 {
                let key: u64 = rng.gen::<u64>() % (NUM_KEYS as u64 * 3);
                found += map.get(&key).is_some() as u64;
            }
            found
        })
    });
    group.finish();
}

fn bench_std_hashmap(c: &mut Criterion) {
    let mut group = c.benchmark_group("std_hashmap");
    group.throughput(Throughput::Elements(NUM_OPS * 6));
    group.sample_size(10);
    group.bench_function("insert_and_remove", |b| {
        let mut map = std::collections::HashMap::with_capacity_and_hasher(
            NUM_KEYS as usize,
            BuildHasherDefault::<MurmurHasher>::default(),
        );

        let mut rng = thread_rng();
        let mut bits: u64 = rng.gen();
        let mut mask = 0u64;

        b.iter(|| {
            for _ in 0..6 {
                // Add 4 random bits
                mask <<= 4;
                mask |= bits & 0b00001111;
                bits >>= 4;

                for i in 0..NUM_OPS {
                    let key: u64 = rng.gen::<u64>() & mask;
                    map.insert(key, i);
                    let key: u64 = rng.gen::<u64>() & mask;
                    map.remove(&key);
                }
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_std_hashmap, bench_qmap);
criterion_main!(benches);
