use hoh::concurrency::interrupt;
use hoh::concurrency::{ReadGuard, WriteGuard};
use hoh::{Interrupted, LockStrategy, ReentrantRwLock, StampedLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn write_contention<L: LockStrategy + 'static>() {
    let lock = Arc::new(L::default());
    let inside = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let (lock, inside) = (Arc::clone(&lock), Arc::clone(&inside));
            thread::spawn(move || {
                for _ in 0..200 {
                    let _g = WriteGuard::acquire(&*lock).unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert!(!lock.is_locked());
}

#[test]
fn test_write_contention_stamped() {
    write_contention::<StampedLock>();
}

#[test]
fn test_write_contention_rwlock() {
    write_contention::<ReentrantRwLock>();
}

fn readers_and_writers<L: LockStrategy>() {
    let lock = L::default();
    let writers_inside = AtomicUsize::new(0);
    thread::scope(|s| {
        for t in 0..6 {
            let (lock, writers_inside) = (&lock, &writers_inside);
            s.spawn(move || {
                for i in 0..300 {
                    if (t + i) % 5 == 0 {
                        let _g = WriteGuard::acquire(lock).unwrap();
                        writers_inside.fetch_add(1, Ordering::SeqCst);
                        thread::yield_now();
                        writers_inside.fetch_sub(1, Ordering::SeqCst);
                    } else {
                        let _g = ReadGuard::acquire(lock).unwrap();
                        assert_eq!(writers_inside.load(Ordering::SeqCst), 0);
                    }
                }
            });
        }
    });
    assert!(!lock.is_locked());
}

#[test]
fn test_readers_and_writers_stamped() {
    readers_and_writers::<StampedLock>();
}

#[test]
fn test_readers_and_writers_rwlock() {
    readers_and_writers::<ReentrantRwLock>();
}

fn interrupt_blocked_writer<L: LockStrategy>() {
    let lock = L::default();
    let read = ReadGuard::acquire(&lock).unwrap();
    thread::scope(|s| {
        let (writer, handle) = interrupt::spawn_scoped(s, || WriteGuard::acquire(&lock).map(|_| ()));
        thread::sleep(Duration::from_millis(30));
        handle.interrupt();
        assert_eq!(writer.join().unwrap(), Err(Interrupted));
    });
    drop(read);
    assert!(!lock.is_locked());
    assert!(WriteGuard::try_acquire(&lock).is_some());
}

#[test]
fn test_interrupt_blocked_writer_stamped() {
    interrupt_blocked_writer::<StampedLock>();
}

#[test]
fn test_interrupt_blocked_writer_rwlock() {
    interrupt_blocked_writer::<ReentrantRwLock>();
}

#[test]
fn test_stamped_optimistic_read_survives_readers() {
    let lock = StampedLock::new();
    let stamp = lock.try_optimistic_read();
    let read = ReadGuard::acquire(&lock).unwrap();
    assert!(lock.validate(stamp));
    drop(read);
    drop(WriteGuard::acquire(&lock).unwrap());
    assert!(!lock.validate(stamp));
}
