//! Per-thread interrupt status.
//!
//! Every thread carries an interrupt flag. Blocking acquisitions in
//! [`crate::concurrency::sync`] consult it before parking and after every wakeup;
//! a raised flag is consumed and the wait returns [`Interrupted`] once the waiter
//! has unlinked itself from the lock's queue. Raising the flag through an
//! [`InterruptHandle`] also unparks the target thread so a blocked wait notices
//! promptly.
//!
//! Threads started with [`spawn`] or [`spawn_scoped`] share their flag with the
//! returned handle from the very first instruction, so an interrupt raised before
//! the thread gets scheduled is never lost.

use crate::error::Interrupted;
use std::cell::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, Scope, ScopedJoinHandle, Thread};
use std::time::{Duration, Instant};

thread_local! {
    static STATUS: OnceCell<Arc<AtomicBool>> = const { OnceCell::new() };
}

fn with_status<R>(f: impl FnOnce(&Arc<AtomicBool>) -> R) -> R {
    STATUS.with(|cell| f(cell.get_or_init(|| Arc::new(AtomicBool::new(false)))))
}

fn install(flag: Arc<AtomicBool>) {
    STATUS.with(|cell| {
        // Fresh thread: nothing has touched the slot yet.
        let _ = cell.set(flag);
    });
}

/// A handle that can interrupt one particular thread.
#[derive(Clone, Debug)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
    thread: Thread,
}

impl InterruptHandle {
    /// Returns a handle for the calling thread.
    pub fn current() -> Self {
        Self {
            flag: with_status(Arc::clone),
            thread: thread::current(),
        }
    }

    /// Raises the thread's interrupt status and unparks it.
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Release);
        self.thread.unpark();
        #[cfg(feature = "tracing")]
        tracing::trace!(target: "hoh::interrupt", thread = ?self.thread.id(), "interrupt raised");
    }

    /// Returns `true` if the status is raised and not yet consumed.
    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// The thread this handle interrupts.
    pub fn thread(&self) -> &Thread {
        &self.thread
    }
}

/// Consumes the calling thread's interrupt status.
///
/// # Errors
/// Returns [`Interrupted`] if the status was raised; the status is cleared.
#[inline]
pub fn check() -> Result<(), Interrupted> {
    if take() {
        Err(Interrupted)
    } else {
        Ok(())
    }
}

/// Clears the calling thread's interrupt status, returning whether it was raised.
#[inline]
pub fn take() -> bool {
    with_status(|flag| flag.swap(false, Ordering::AcqRel))
}

/// Returns `true` if the calling thread's interrupt status is raised, without clearing it.
#[inline]
pub fn is_interrupted() -> bool {
    with_status(|flag| flag.load(Ordering::Acquire))
}

/// Re-raises the calling thread's interrupt status.
///
/// Used by code that observed an interrupt but cannot report it and wants the
/// next blocking call to see it.
pub fn restore() {
    with_status(|flag| flag.store(true, Ordering::Release));
}

/// Spawns a thread whose interrupt status is reachable through the returned handle.
pub fn spawn<F, T>(f: F) -> (JoinHandle<T>, InterruptHandle)
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let flag = Arc::new(AtomicBool::new(false));
    let child = Arc::clone(&flag);
    let handle = thread::spawn(move || {
        install(child);
        f()
    });
    let thread = handle.thread().clone();
    (handle, InterruptHandle { flag, thread })
}

/// Scoped variant of [`spawn`].
pub fn spawn_scoped<'scope, 'env, F, T>(
    scope: &'scope Scope<'scope, 'env>,
    f: F,
) -> (ScopedJoinHandle<'scope, T>, InterruptHandle)
where
    F: FnOnce() -> T + Send + 'scope,
    T: Send + 'scope,
{
    let flag = Arc::new(AtomicBool::new(false));
    let child = Arc::clone(&flag);
    let handle = scope.spawn(move || {
        install(child);
        f()
    });
    let thread = handle.thread().clone();
    (handle, InterruptHandle { flag, thread })
}

/// Sleeps for `duration` unless interrupted first.
///
/// # Errors
/// Returns [`Interrupted`] (consuming the status) if the thread is interrupted
/// before or during the sleep.
pub fn sleep(duration: Duration) -> Result<(), Interrupted> {
    let deadline = Instant::now() + duration;
    loop {
        check()?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        thread::park_timeout(deadline - now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_consumed_by_check() {
        restore();
        assert!(is_interrupted());
        assert_eq!(check(), Err(Interrupted));
        assert!(!is_interrupted());
        assert_eq!(check(), Ok(()));
    }

    #[test]
    fn interrupt_before_start_is_seen() {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let (handle, interrupt) = spawn(move || {
            rx.recv().ok();
            check()
        });
        interrupt.interrupt();
        tx.send(()).unwrap();
        assert_eq!(handle.join().unwrap(), Err(Interrupted));
    }

    #[test]
    fn sleep_is_cut_short() {
        let (handle, interrupt) = spawn(|| sleep(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(20));
        interrupt.interrupt();
        assert_eq!(handle.join().unwrap(), Err(Interrupted));
    }
}
