use bitcask::{Bitcask, ConfigOpt};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tempfile::tempdir;

const N_KEYS: usize = 1_000;
const VALUE_SIZE: usize = 100;

fn populate(store: &mut Bitcask) {
    let value = vec![b'x'; VALUE_SIZE];
    for i in 0..N_KEYS {
        store
            .put(format!("key{}", i).as_bytes(), &value)
            .unwrap();
    }
}

fn put_benchmark(c: &mut Criterion) {
    c.bench_function("bitcask_put_1k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let store = Bitcask::open(dir.path().join("db"), &[ConfigOpt::ReadWrite]).unwrap();
                (dir, store)
            },
            |(_dir, mut store)| {
                populate(&mut store);
            },
            BatchSize::SmallInput,
        );
    });
}

fn get_hit_benchmark(c: &mut Criterion) {
    c.bench_function("bitcask_get_hit_1k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let mut store =
                    Bitcask::open(dir.path().join("db"), &[ConfigOpt::ReadWrite]).unwrap();
                populate(&mut store);
                (dir, store)
            },
            |(_dir, store)| {
                for i in 0..N_KEYS {
                    let v = store.get(format!("key{}", i).as_bytes()).unwrap();
                    assert_eq!(v.len(), VALUE_SIZE);
                }
            },
            BatchSize::LargeInput,
        );
    });
}

fn merge_benchmark(c: &mut Criterion) {
    c.bench_function("bitcask_merge_1k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let mut store =
                    Bitcask::open(dir.path().join("db"), &[ConfigOpt::ReadWrite]).unwrap();
                // two rounds so half the log is shadowed
                populate(&mut store);
                populate(&mut store);
                (dir, store)
            },
            |(_dir, mut store)| {
                store.merge().unwrap();
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, put_benchmark, get_hit_benchmark, merge_benchmark);
criterion_main!(benches);
