use super::wait_queue::WaitQueue;
use super::{LockStrategy, Stamp};
use crate::error::Interrupted;
use core::fmt;
use std::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};

/// Reader count occupies the low bits of the state word.
const READER_BITS: u32 = 16;
const READER_UNIT: u64 = 1;
/// Saturation point of the reader count; further readers spin until one leaves.
const READER_MASK: u64 = (1 << READER_BITS) - 1;
const WRITE_BIT: u64 = 1 << READER_BITS;
/// Write bit plus version: the part of the state a stamp is validated against.
const STATE_BITS: u64 = !READER_MASK;
/// Initial state. Non-zero in `STATE_BITS`, so [`Stamp::INVALID`] never validates.
const ORIGIN: u64 = WRITE_BIT << 1;

/// A versioned lock with optimistic reads.
///
/// # State word
///
/// ```text
///  63 ................. 17 | 16 | 15 ........ 0
///  version                 | W  | readers
/// ```
///
/// Acquiring the write lock adds `W` (setting the bit); releasing adds `W` again,
/// which clears the bit and carries into the version. Every write therefore moves
/// the version forward, and an optimistic stamp (`state & STATE_BITS` taken while
/// `W` was clear) validates only if the state bits are unchanged.
///
/// Read stamps keep the reader bits so they can be told apart from optimistic
/// stamps when converted to a write stamp.
///
/// A writer that has to park is counted in `writers_waiting`; while that count is
/// non-zero new read locks are refused, so a steady stream of overlapping readers
/// cannot keep a writer out. Optimistic reads are unaffected. The lock is not
/// reentrant for readers: a thread holding a read lock must not block for another
/// one on the same lock.
pub struct StampedLock {
    state: AtomicU64,
    writers_waiting: AtomicU32,
    queue: WaitQueue,
}

impl StampedLock {
    /// Creates an unlocked lock.
    pub const fn new() -> Self {
        Self {
            state: AtomicU64::new(ORIGIN),
            writers_waiting: AtomicU32::new(0),
            queue: WaitQueue::new(),
        }
    }

    /// Number of read locks currently held.
    pub fn read_lock_count(&self) -> u64 {
        self.state.load(Ordering::Acquire) & READER_MASK
    }

    /// Returns `true` while a writer is parked waiting for the lock.
    pub fn has_queued_writer(&self) -> bool {
        self.writers_waiting.load(Ordering::SeqCst) != 0
    }

    fn release_state(state: u64) -> u64 {
        let next = state.wrapping_add(WRITE_BIT);
        if next & STATE_BITS == 0 {
            ORIGIN
        } else {
            next
        }
    }
}

impl Default for StampedLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StampedLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.state.load(Ordering::Relaxed);
        f.debug_struct("StampedLock")
            .field("version", &(s >> (READER_BITS + 1)))
            .field("write_locked", &(s & WRITE_BIT != 0))
            .field("readers", &(s & READER_MASK))
            .field("writers_waiting", &self.writers_waiting.load(Ordering::Relaxed))
            .finish()
    }
}

impl LockStrategy for StampedLock {
    const NAME: &'static str = "stamped";

    #[inline]
    fn try_optimistic_read(&self) -> Stamp {
        let s = self.state.load(Ordering::Acquire);
        if s & WRITE_BIT == 0 {
            Stamp::new(s & STATE_BITS)
        } else {
            Stamp::INVALID
        }
    }

    #[inline]
    fn validate(&self, stamp: Stamp) -> bool {
        // Order the caller's preceding reads before the re-check of the version.
        fence(Ordering::Acquire);
        stamp.is_valid() && (stamp.raw() & STATE_BITS) == (self.state.load(Ordering::Relaxed) & STATE_BITS)
    }

    fn try_acquire_read(&self) -> Option<Stamp> {
        if self.has_queued_writer() {
            return None;
        }
        let mut s = self.state.load(Ordering::Relaxed);
        loop {
            if s & WRITE_BIT != 0 || s & READER_MASK == READER_MASK {
                return None;
            }
            match self.state.compare_exchange_weak(
                s,
                s + READER_UNIT,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(Stamp::new(s + READER_UNIT)),
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
        let mut s = self.state.load(Ordering::Relaxed);
        loop {
            assert!(
                s & READER_MASK != 0 && (s & STATE_BITS) == (stamp.raw() & STATE_BITS),
                "release_read: {stamp:?} does not describe a held read lock"
            );
            match self.state.compare_exchange_weak(
                s,
                s - READER_UNIT,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => s = actual,
            }
        }
        if s & READER_MASK == READER_UNIT {
            self.queue.notify();
        }
    }

    fn try_acquire_write(&self) -> Option<Stamp> {
        let s = self.state.load(Ordering::Relaxed);
        if s & (WRITE_BIT | READER_MASK) != 0 {
            return None;
        }
        self.state
            .compare_exchange(s, s + WRITE_BIT, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Stamp::new(s + WRITE_BIT))
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
        let s = self.state.load(Ordering::Relaxed);
        assert!(
            s == stamp.raw() && s & WRITE_BIT != 0,
            "release_write: {stamp:?} does not describe the held write lock"
        );
        self.state.store(Self::release_state(s), Ordering::Release);
        self.queue.notify();
    }

    fn try_upgrade_to_write(&self, stamp: Stamp) -> Option<Stamp> {
        let held = stamp.raw() & READER_MASK;
        let mut s = self.state.load(Ordering::Acquire);
        loop {
            if !stamp.is_valid() || (s & STATE_BITS) != (stamp.raw() & STATE_BITS) {
                return None;
            }
            if stamp.raw() & WRITE_BIT != 0 {
                return Some(stamp);
            }
            let readers = s & READER_MASK;
            let next = if held == 0 {
                // Optimistic stamp: grantable only when nobody holds the lock.
                if readers != 0 {
                    return None;
                }
                s + WRITE_BIT
            } else {
                // Read stamp: the caller must be the only reader.
                if readers != READER_UNIT {
                    return None;
                }
                s - READER_UNIT + WRITE_BIT
            };
            match self
                .state
                .compare_exchange_weak(s, next, Ordering::Acquire, Ordering::Acquire)
            {
                Ok(_) => return Some(Stamp::new(next)),
                Err(actual) => s = actual,
            }
        }
    }

    #[inline]
    fn is_read_locked(&self) -> bool {
        self.state.load(Ordering::Acquire) & READER_MASK != 0
    }

    #[inline]
    fn is_write_locked(&self) -> bool {
        self.state.load(Ordering::Acquire) & WRITE_BIT != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_wraps_to_origin() {
        // Highest version with the write bit set.
        assert_eq!(StampedLock::release_state(STATE_BITS), ORIGIN);
        assert_eq!(StampedLock::release_state(ORIGIN + WRITE_BIT), ORIGIN + 2 * WRITE_BIT);
    }

    #[test]
    fn optimistic_stamp_carries_no_reader_bits() {
        let lock = StampedLock::new();
        let read = lock.acquire_read().unwrap();
        let optimistic = lock.try_optimistic_read();
        assert_eq!(optimistic.raw() & READER_MASK, 0);
        assert_eq!(read.raw() & READER_MASK, 1);
        assert!(lock.validate(optimistic));
        assert!(lock.validate(read));
        lock.release_read(read);
    }
}
