//! Lock strategies for per-node locking.
//!
//! Both strategies implement [`LockStrategy`], a stamp-based contract modelled on a
//! stamped lock:
//!
//! - [`StampedLock`]: a version counter plus reader count in one atomic word.
//!   Offers lock-free optimistic reads validated against the version, blocking
//!   read/write locks, and in-place conversion of a read or optimistic stamp into
//!   a write stamp.
//! - [`ReentrantRwLock`]: a plain shared/exclusive lock. Reads always block (the
//!   optimistic attempt always fails validation) and upgrades are never granted.
//!
//! Blocking acquisitions park on an internal wait queue and honour the calling
//! thread's interrupt status (see [`crate::concurrency::interrupt`]).
//!
//! A writer that has to park holds back new readers on both strategies, so it
//! is served once the readers already inside have left.

mod guard;
mod rw_lock;
mod stamped_lock;
mod wait_queue;


pub use guard::{ReadGuard, WriteGuard};
pub use rw_lock::ReentrantRwLock;
pub use stamped_lock::StampedLock;

use crate::error::Interrupted;
use core::fmt;

/// A token describing how a lock was taken, handed back on release.
///
/// The zero stamp is never issued for a valid read or hold; it is what a failed
/// optimistic read returns.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stamp(u64);

impl Stamp {
    /// The stamp returned by an optimistic read that could not be granted.
    pub const INVALID: Stamp = Stamp(0);

    #[inline]
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw stamp bits.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns `false` for [`Stamp::INVALID`].
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Debug for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stamp({:#x})", self.0)
    }
}

/// The per-node lock capability.
///
/// # Contract
/// - Any number of readers may hold the lock at once; readers never wait for
///   other readers.
/// - A writer excludes all readers and all other writers.
/// - Once a writer is waiting, new read locks are held back until it has been
///   served or has given up, so overlapping readers cannot starve it. Whether a
///   thread already holding a read lock may take another one is up to the
///   strategy.
/// - A thread must never block for the write lock while holding a read lock on
///   the same instance; it must either convert the read stamp with
///   [`try_upgrade_to_write`](LockStrategy::try_upgrade_to_write) or release it
///   first.
/// - Releasing with a stamp that does not describe a held lock is a programming
///   error and panics.
pub trait LockStrategy: Default + Send + Sync {
    /// Short name used in benchmark ids and logs.
    const NAME: &'static str;

    /// Takes a snapshot stamp without blocking.
    ///
    /// Returns [`Stamp::INVALID`] when no optimistic read can be granted (the lock
    /// is write-held, or the strategy has no optimistic path).
    fn try_optimistic_read(&self) -> Stamp;

    /// Returns `true` if no write has been granted since `stamp` was issued.
    ///
    /// Always `false` for [`Stamp::INVALID`].
    fn validate(&self, stamp: Stamp) -> bool;

    /// Takes a read lock if that is possible without blocking.
    fn try_acquire_read(&self) -> Option<Stamp>;

    /// Takes a read lock, blocking while a writer holds or waits for the lock.
    ///
    /// # Errors
    /// Returns [`Interrupted`] if the thread is interrupted while blocked.
    fn acquire_read(&self) -> Result<Stamp, Interrupted>;

    /// Releases a read lock taken by `acquire_read`/`try_acquire_read`.
    ///
    /// # Panics
    /// Panics if `stamp` does not describe a held read lock.
    fn release_read(&self, stamp: Stamp);

    /// Takes the write lock if that is possible without blocking.
    fn try_acquire_write(&self) -> Option<Stamp>;

    /// Takes the write lock, blocking while any reader or writer holds the lock.
    ///
    /// # Errors
    /// Returns [`Interrupted`] if the thread is interrupted while blocked.
    fn acquire_write(&self) -> Result<Stamp, Interrupted>;

    /// Releases the write lock.
    ///
    /// # Panics
    /// Panics if `stamp` does not describe the held write lock.
    fn release_write(&self, stamp: Stamp);

    /// Converts `stamp` into a write stamp without an unlocked window.
    ///
    /// `stamp` may be an optimistic stamp, a read stamp held by the caller, or a
    /// write stamp (returned unchanged). On `None` nothing changed: a read lock
    /// described by `stamp` is still held.
    fn try_upgrade_to_write(&self, stamp: Stamp) -> Option<Stamp>;

    /// Returns `true` if at least one read lock is held.
    fn is_read_locked(&self) -> bool;

    /// Returns `true` if the write lock is held.
    fn is_write_locked(&self) -> bool;

    /// Returns `true` if the lock is held in any mode.
    #[inline]
    fn is_locked(&self) -> bool {
        self.is_read_locked() || self.is_write_locked()
    }
}
