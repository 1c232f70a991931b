use super::wait_queue::WaitQueue;
use super::{LockStrategy, Stamp};
use crate::error::Interrupted;
use core::fmt;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

const WRITER: u32 = 1 << 31;
const READER_MASK: u32 = WRITER - 1;

const READ_STAMP: Stamp = Stamp::new(1);
const WRITE_STAMP: Stamp = Stamp::new(2);

/// Small per-thread identity; `0` means "no owner".
fn thread_token() -> usize {
    static NEXT: AtomicUsize = AtomicUsize::new(1);
    thread_local! {
        static TOKEN: usize = NEXT.fetch_add(1, Ordering::Relaxed);
    }
    TOKEN.with(|token| *token)
}

thread_local! {
    /// Read locks the current thread holds, per lock address.
    static READ_HOLDS: RefCell<Vec<(usize, u32)>> = const { RefCell::new(Vec::new()) };
}

/// A reentrant reader-writer lock without an optimistic path.
///
/// - While a writer is parked waiting, new readers are held back so it cannot be
///   starved. A thread that already holds a read lock may still re-take it.
/// - The writing thread may re-take the write lock and may also take read locks.
/// - Read locks are counted per thread and must be released by the thread that
///   took them.
/// - [`try_optimistic_read`](LockStrategy::try_optimistic_read) always returns
///   [`Stamp::INVALID`] and [`try_upgrade_to_write`](LockStrategy::try_upgrade_to_write)
///   only succeeds for a write stamp, so callers always fall back to blocking.
pub struct ReentrantRwLock {
    state: AtomicU32,
    owner: AtomicUsize,
    write_holds: AtomicU32,
    writers_waiting: AtomicU32,
    queue: WaitQueue,
}

impl ReentrantRwLock {
    /// Creates an unlocked lock.
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(0),
            owner: AtomicUsize::new(0),
            write_holds: AtomicU32::new(0),
            writers_waiting: AtomicU32::new(0),
            queue: WaitQueue::new(),
        }
    }

    /// Returns `true` if the calling thread holds the write lock.
    pub fn is_write_locked_by_current_thread(&self) -> bool {
        self.owner.load(Ordering::Relaxed) == thread_token()
    }

    /// Number of read locks currently held, across all threads.
    pub fn read_lock_count(&self) -> u32 {
        self.state.load(Ordering::Acquire) & READER_MASK
    }

    /// Read locks held by the calling thread.
    pub fn read_hold_count(&self) -> u32 {
        let key = self.key();
        READ_HOLDS.with(|holds| {
            holds
                .borrow()
                .iter()
                .find(|(lock, _)| *lock == key)
                .map_or(0, |(_, count)| *count)
        })
    }

    /// Returns `true` while a writer is parked waiting for the lock.
    pub fn has_queued_writer(&self) -> bool {
        self.writers_waiting.load(Ordering::SeqCst) != 0
    }

    fn key(&self) -> usize {
        self as *const Self as usize
    }

    fn add_read_hold(&self) {
        let key = self.key();
        READ_HOLDS.with(|holds| {
            let mut holds = holds.borrow_mut();
            match holds.iter_mut().find(|(lock, _)| *lock == key) {
                Some((_, count)) => *count += 1,
                None => holds.push((key, 1)),
            }
        });
    }

    /// Drops one of the calling thread's read holds; `false` if it had none.
    fn remove_read_hold(&self) -> bool {
        let key = self.key();
        READ_HOLDS.with(|holds| {
            let mut holds = holds.borrow_mut();
            let Some(at) = holds.iter().position(|(lock, _)| *lock == key) else {
                return false;
            };
            holds[at].1 -= 1;
            if holds[at].1 == 0 {
                holds.swap_remove(at);
            }
            true
        })
    }

    /// Reentrant write holds of the owning thread, `0` if unlocked.
    pub fn write_hold_count(&self) -> u32 {
        if self.is_write_locked() {
            self.write_holds.load(Ordering::Relaxed)
        } else {
            0
        }
    }
}

impl Default for ReentrantRwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReentrantRwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.state.load(Ordering::Relaxed);
        f.debug_struct("ReentrantRwLock")
            .field("write_locked", &(s & WRITER != 0))
            .field("readers", &(s & READER_MASK))
            .field("writers_waiting", &self.writers_waiting.load(Ordering::Relaxed))
            .finish()
    }
}

impl LockStrategy for ReentrantRwLock {
    const NAME: &'static str = "rwlock";

    #[inline]
    fn try_optimistic_read(&self) -> Stamp {
        Stamp::INVALID
    }

    fn validate(&self, stamp: Stamp) -> bool {
        match stamp {
            READ_STAMP => self.read_hold_count() > 0,
            WRITE_STAMP => self.is_write_locked_by_current_thread(),
            _ => false,
        }
    }

    fn try_acquire_read(&self) -> Option<Stamp> {
        let owner = self.is_write_locked_by_current_thread();
        if !owner && self.has_queued_writer() && self.read_hold_count() == 0 {
            return None;
        }
        let mut s = self.state.load(Ordering::Relaxed);
        loop {
            if (s & WRITER != 0 && !owner) || s & READER_MASK == READER_MASK {
                return None;
            }
            match self
                .state
                .compare_exchange_weak(s, s + 1, Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => {
                    self.add_read_hold();
                    return Some(READ_STAMP);
                }
                Err(actual) => s = actual,
            }
        }
    }

    fn acquire_read(&self) -> Result<Stamp, Interrupted> {
        if let Some(stamp) = self.try_acquire_read() {
            return Ok(stamp);
        }
        self.queue.wait_until(|| self.try_acquire_read())
    }

    fn release_read(&self, stamp: Stamp) {
        assert_eq!(stamp, READ_STAMP, "release_read: {stamp:?} is not a read stamp");
        assert!(
            self.remove_read_hold(),
            "release_read: the calling thread does not hold a read lock"
        );
        let mut s = self.state.load(Ordering::Relaxed);
        loop {
            assert!(s & READER_MASK != 0, "release_read: no read lock is held");
            match self
                .state
                .compare_exchange_weak(s, s - 1, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => s = actual,
            }
        }
        if s & READER_MASK == 1 {
            self.queue.notify();
        }
    }

    fn try_acquire_write(&self) -> Option<Stamp> {
        let me = thread_token();
        if self.owner.load(Ordering::Relaxed) == me {
            self.write_holds.fetch_add(1, Ordering::Relaxed);
            return Some(WRITE_STAMP);
        }
        self.state
            .compare_exchange(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;
        self.owner.store(me, Ordering::Relaxed);
        self.write_holds.store(1, Ordering::Relaxed);
        Some(WRITE_STAMP)
    }

    fn acquire_write(&self) -> Result<Stamp, Interrupted> {
        if let Some(stamp) = self.try_acquire_write() {
            return Ok(stamp);
        }
        self.writers_waiting.fetch_add(1, Ordering::SeqCst);
        let acquired = self.queue.wait_until(|| self.try_acquire_write());
        self.writers_waiting.fetch_sub(1, Ordering::SeqCst);
        if acquired.is_err() {
            // Readers held back for this writer may proceed again.
            self.queue.notify();
        }
        acquired
    }

    fn release_write(&self, stamp: Stamp) {
        assert_eq!(stamp, WRITE_STAMP, "release_write: {stamp:?} is not a write stamp");
        assert!(
            self.is_write_locked_by_current_thread(),
            "release_write: the calling thread does not hold the write lock"
        );
        let remaining = self.write_holds.fetch_sub(1, Ordering::Relaxed) - 1;
        if remaining == 0 {
            self.owner.store(0, Ordering::Relaxed);
            self.state.fetch_and(!WRITER, Ordering::Release);
            self.queue.notify();
        }
    }

    fn try_upgrade_to_write(&self, stamp: Stamp) -> Option<Stamp> {
        (stamp == WRITE_STAMP && self.is_write_locked_by_current_thread()).then_some(WRITE_STAMP)
    }

    #[inline]
    fn is_read_locked(&self) -> bool {
        self.state.load(Ordering::Acquire) & READER_MASK != 0
    }

    #[inline]
    fn is_write_locked(&self) -> bool {
        self.state.load(Ordering::Acquire) & WRITER != 0
    }
}
