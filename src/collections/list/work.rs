//! The per-access work collaborator.
//!
//! [`ConcurrentList::get`](super::ConcurrentList::get) passes every element it
//! returns through a [`SimulateWork`] while the element's node is still locked.
//! Benchmarks use this to model processing cost; observationally it must be the
//! identity and must not touch the list.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Models the cost of processing an element.
pub trait SimulateWork<T>: Send + Sync {
    /// Returns `value`, possibly after a delay.
    fn simulate(&self, value: T) -> T;
}

impl<T, F> SimulateWork<T> for F
where
    F: Fn(T) -> T + Send + Sync,
{
    #[inline]
    fn simulate(&self, value: T) -> T {
        self(value)
    }
}

/// No work at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl<T> SimulateWork<T> for Identity {
    #[inline(always)]
    fn simulate(&self, value: T) -> T {
        value
    }
}

/// Sleeps for a fixed duration per access.
#[derive(Clone, Copy, Debug)]
pub struct Sleep(pub Duration);

impl<T> SimulateWork<T> for Sleep {
    fn simulate(&self, value: T) -> T {
        std::thread::sleep(self.0);
        value
    }
}

/// Busy-waits for a fixed duration per access, keeping the core occupied.
#[derive(Clone, Copy, Debug)]
pub struct Spin(pub Duration);

impl<T> SimulateWork<T> for Spin {
    fn simulate(&self, value: T) -> T {
        let start = Instant::now();
        while start.elapsed() < self.0 {
            std::hint::spin_loop();
        }
        value
    }
}

/// Counts accesses, then delegates to `W`.
#[derive(Debug, Default)]
pub struct Counted<W> {
    inner: W,
    accesses: AtomicUsize,
}

impl<W> Counted<W> {
    /// Wraps `inner` with a zeroed counter.
    pub const fn new(inner: W) -> Self {
        Self {
            inner,
            accesses: AtomicUsize::new(0),
        }
    }

    /// Accesses so far.
    pub fn accesses(&self) -> usize {
        self.accesses.load(Ordering::Relaxed)
    }
}

impl<T, W: SimulateWork<T>> SimulateWork<T> for Counted<W> {
    fn simulate(&self, value: T) -> T {
        self.accesses.fetch_add(1, Ordering::Relaxed);
        self.inner.simulate(value)
    }
}
