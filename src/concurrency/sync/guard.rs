use super::{LockStrategy, Stamp};
use crate::error::Interrupted;

/// Scoped read lock on any [`LockStrategy`]; released on drop.
#[must_use = "the read lock is released as soon as the guard is dropped"]
pub struct ReadGuard<'a, L: LockStrategy> {
    lock: &'a L,
    stamp: Stamp,
}

impl<'a, L: LockStrategy> ReadGuard<'a, L> {
    /// Blocks for a read lock on `lock`.
    ///
    /// # Errors
    /// Returns [`Interrupted`] if the thread is interrupted while blocked.
    pub fn acquire(lock: &'a L) -> Result<Self, Interrupted> {
        let stamp = lock.acquire_read()?;
        Ok(Self { lock, stamp })
    }

    /// Takes a read lock on `lock` if that is possible without blocking.
    pub fn try_acquire(lock: &'a L) -> Option<Self> {
        lock.try_acquire_read().map(|stamp| Self { lock, stamp })
    }

    /// The stamp of the held read lock.
    pub fn stamp(&self) -> Stamp {
        self.stamp
    }
}

impl<L: LockStrategy> Drop for ReadGuard<'_, L> {
    fn drop(&mut self) {
        self.lock.release_read(self.stamp);
    }
}

/// Scoped write lock on any [`LockStrategy`]; released on drop.
#[must_use = "the write lock is released as soon as the guard is dropped"]
pub struct WriteGuard<'a, L: LockStrategy> {
    lock: &'a L,
    stamp: Stamp,
}

impl<'a, L: LockStrategy> WriteGuard<'a, L> {
    /// Blocks for the write lock on `lock`.
    ///
    /// # Errors
    /// Returns [`Interrupted`] if the thread is interrupted while blocked.
    pub fn acquire(lock: &'a L) -> Result<Self, Interrupted> {
        let stamp = lock.acquire_write()?;
        Ok(Self { lock, stamp })
    }

    /// Takes the write lock on `lock` if that is possible without blocking.
    pub fn try_acquire(lock: &'a L) -> Option<Self> {
        lock.try_acquire_write().map(|stamp| Self { lock, stamp })
    }

    /// The stamp of the held write lock.
    pub fn stamp(&self) -> Stamp {
        self.stamp
    }
}

impl<L: LockStrategy> Drop for WriteGuard<'_, L> {
    fn drop(&mut self) {
        self.lock.release_write(self.stamp);
    }
}
