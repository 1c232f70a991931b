//! Locking primitives and thread interruption.
//!
//! The list in [`crate::collections`] never touches atomics directly; everything it
//! needs from the platform goes through the [`sync::LockStrategy`] capability and
//! the per-thread interrupt status in [`interrupt`].

pub mod interrupt;
pub mod sync;

pub use interrupt::InterruptHandle;
pub use sync::{LockStrategy, ReadGuard, ReentrantRwLock, Stamp, StampedLock, WriteGuard};
