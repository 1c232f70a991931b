use hoh::simulation::{Dinner, PhilosopherHandle, Table, TableLog};
use hoh::{ConcurrentList, InterruptHandle, ListError, ReentrantRwLock, StampedLock};
use std::cell::Cell;

fn assert_send<T: Send>() {}
fn assert_sync<T: Sync>() {}

#[test]
fn locks_are_send_and_sync() {
    assert_send::<StampedLock>();
    assert_sync::<StampedLock>();
    assert_send::<ReentrantRwLock>();
    assert_sync::<ReentrantRwLock>();
}

#[test]
fn list_send_sync_follows_t_bounds() {
    // `u64` is Send + Sync, so the list can be shared between threads.
    assert_send::<ConcurrentList<u64, StampedLock>>();
    assert_sync::<ConcurrentList<u64, StampedLock>>();
    assert_sync::<ConcurrentList<String, ReentrantRwLock>>();
    // `Cell` is Send but not Sync: the list can still move to another thread.
    assert_send::<ConcurrentList<Cell<u8>, StampedLock>>();
}

#[test]
fn handles_and_errors_cross_threads() {
    assert_send::<InterruptHandle>();
    assert_sync::<InterruptHandle>();
    assert_send::<ListError>();
    assert_sync::<ListError>();
    assert_send::<PhilosopherHandle>();
    assert_send::<Dinner>();
    assert_sync::<Table>();
    assert_sync::<TableLog>();
}
