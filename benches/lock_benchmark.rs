use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use hoh::concurrency::{ReadGuard, WriteGuard};
use hoh::{LockStrategy, ReentrantRwLock, StampedLock};
use std::sync::RwLock;
use std::thread;

fn bench_uncontended<L: LockStrategy>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("lock_uncontended/{}", L::NAME));
    let lock = L::default();

    group.bench_function("optimistic_validate", |b| {
        b.iter(|| {
            let stamp = lock.try_optimistic_read();
            black_box(lock.validate(stamp))
        });
    });
    group.bench_function("read", |b| {
        b.iter(|| black_box(ReadGuard::acquire(&lock).unwrap().stamp()));
    });
    group.bench_function("write", |b| {
        b.iter(|| black_box(WriteGuard::acquire(&lock).unwrap().stamp()));
    });
    group.bench_function("read_then_upgrade", |b| {
        b.iter(|| {
            let stamp = lock.acquire_read().unwrap();
            match lock.try_upgrade_to_write(stamp) {
                Some(write) => lock.release_write(write),
                None => {
                    lock.release_read(stamp);
                    drop(WriteGuard::acquire(&lock).unwrap());
                }
            }
        });
    });
    group.finish();
}

fn bench_std_uncontended(c: &mut Criterion) {
    let mut group = c.benchmark_group("lock_uncontended/std");
    let lock = RwLock::new(());
    group.bench_function("read", |b| b.iter(|| drop(black_box(lock.read().unwrap()))));
    group.bench_function("write", |b| b.iter(|| drop(black_box(lock.write().unwrap()))));
    group.finish();
}

fn bench_uncontended_all(c: &mut Criterion) {
    bench_uncontended::<StampedLock>(c);
    bench_uncontended::<ReentrantRwLock>(c);
    bench_std_uncontended(c);
}

/// Four threads taking the same lock; one acquisition in eight is a write.
fn bench_contended(c: &mut Criterion) {
    const THREADS: usize = 4;
    const OPS: usize = 1_000;
    let mut group = c.benchmark_group("lock_contended");
    group.sample_size(20);
    group.throughput(Throughput::Elements((THREADS * OPS) as u64));

    fn run<L: LockStrategy>(lock: &L) {
        thread::scope(|s| {
            for t in 0..THREADS {
                s.spawn(move || {
                    for i in 0..OPS {
                        if (t + i) % 8 == 0 {
                            drop(WriteGuard::acquire(lock).unwrap());
                        } else {
                            drop(ReadGuard::acquire(lock).unwrap());
                        }
                    }
                });
            }
        });
    }

    let stamped = StampedLock::new();
    group.bench_function(StampedLock::NAME, |b| b.iter(|| run(&stamped)));
    let rwlock = ReentrantRwLock::default();
    group.bench_function(ReentrantRwLock::NAME, |b| b.iter(|| run(&rwlock)));

    let std_lock = RwLock::new(());
    group.bench_function("std", |b| {
        b.iter(|| {
            thread::scope(|s| {
                for t in 0..THREADS {
                    let std_lock = &std_lock;
                    s.spawn(move || {
                        for i in 0..OPS {
                            if (t + i) % 8 == 0 {
                                drop(std_lock.write().unwrap());
                            } else {
                                drop(std_lock.read().unwrap());
                            }
                        }
                    });
                }
            });
        });
    });
    group.finish();
}

criterion_group!(benches, bench_uncontended_all, bench_contended);
criterion_main!(benches);
