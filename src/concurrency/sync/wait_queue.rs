use crate::concurrency::interrupt;
use crate::error::Interrupted;
use crossbeam_utils::Backoff;
use std::cell::UnsafeCell;
use std::marker::PhantomPinned;
use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, Thread};

/// A parked thread, linked into a [`WaitQueue`].
///
/// Lives on the waiting thread's stack. It stays in place until the waiter has
/// passed through the queue lock after waking, which is what makes it safe for
/// a waker to touch it while holding that lock.
struct Waiter {
    thread: Thread,
    next: Option<NonNull<Waiter>>,
    queued: bool,
    _pin: PhantomPinned,
}

impl Waiter {
    fn new() -> Self {
        Self {
            thread: thread::current(),
            next: None,
            queued: false,
            _pin: PhantomPinned,
        }
    }
}

/// FIFO of threads parked on one lock.
///
/// The list itself is protected by a small spin lock; the operations under it are
/// pointer swaps. `len` is readable without the spin lock so releasers can skip
/// the queue entirely when nobody is parked.
pub(crate) struct WaitQueue {
    head: UnsafeCell<Option<NonNull<Waiter>>>,
    tail: UnsafeCell<Option<NonNull<Waiter>>>,
    lock: AtomicBool,
    len: AtomicUsize,
}

// SAFETY: the raw links are only touched while `lock` is held.
unsafe impl Sync for WaitQueue {}
unsafe impl Send for WaitQueue {}

struct QueueGuard<'a> {
    queue: &'a WaitQueue,
}

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        self.queue.lock.store(false, Ordering::Release);
    }
}

impl QueueGuard<'_> {
    /// # Safety
    /// `node` must stay valid and in place until it has been unlinked.
    unsafe fn push(&self, node: NonNull<Waiter>) {
        let q = self.queue;
        (*node.as_ptr()).next = None;
        (*node.as_ptr()).queued = true;
        match *q.tail.get() {
            Some(tail) => (*tail.as_ptr()).next = Some(node),
            None => *q.head.get() = Some(node),
        }
        *q.tail.get() = Some(node);
        q.len.fetch_add(1, Ordering::SeqCst);
    }

    /// Removes `node` if a waker has not already popped it.
    ///
    /// # Safety
    /// `node` must be valid.
    unsafe fn unlink(&self, node: NonNull<Waiter>) {
        if !(*node.as_ptr()).queued {
            return;
        }
        let q = self.queue;
        let mut prev: Option<NonNull<Waiter>> = None;
        let mut cur = *q.head.get();
        while let Some(c) = cur {
            if c == node {
                let next = (*c.as_ptr()).next;
                match prev {
                    Some(p) => (*p.as_ptr()).next = next,
                    None => *q.head.get() = next,
                }
                if *q.tail.get() == Some(c) {
                    *q.tail.get() = prev;
                }
                (*c.as_ptr()).queued = false;
                q.len.fetch_sub(1, Ordering::SeqCst);
                return;
            }
            prev = cur;
            cur = (*c.as_ptr()).next;
        }
    }

    fn wake_all(&self) {
        let q = self.queue;
        // SAFETY: queued waiters stay in place until they re-take the queue lock,
        // which we hold.
        unsafe {
            let mut cur = (*q.head.get()).take();
            *q.tail.get() = None;
            while let Some(c) = cur {
                let waiter = &mut *c.as_ptr();
                cur = waiter.next.take();
                waiter.queued = false;
                q.len.fetch_sub(1, Ordering::SeqCst);
                waiter.thread.unpark();
            }
        }
    }
}

impl WaitQueue {
    pub(crate) const fn new() -> Self {
        Self {
            head: UnsafeCell::new(None),
            tail: UnsafeCell::new(None),
            lock: AtomicBool::new(false),
            len: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> QueueGuard<'_> {
        let backoff = Backoff::new();
        while self.lock.swap(true, Ordering::Acquire) {
            backoff.snooze();
        }
        QueueGuard { queue: self }
    }

    /// Number of parked threads.
    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    /// Blocks until `try_acquire` succeeds.
    ///
    /// Spins briefly, then parks. `try_acquire` is retried under the queue lock
    /// right before parking, so a release that happens concurrently is never
    /// missed as long as the releaser calls [`WaitQueue::notify`] after changing
    /// the lock state.
    ///
    /// # Errors
    /// Returns [`Interrupted`] if the thread's interrupt status is raised while it
    /// would have to park. The waiter is unlinked before returning.
    pub(crate) fn wait_until<R>(
        &self,
        mut try_acquire: impl FnMut() -> Option<R>,
    ) -> Result<R, Interrupted> {
        let backoff = Backoff::new();
        loop {
            if let Some(acquired) = try_acquire() {
                return Ok(acquired);
            }
            if !backoff.is_completed() {
                backoff.snooze();
                continue;
            }
            interrupt::check()?;

            let mut waiter = Waiter::new();
            let node = NonNull::from(&mut waiter);
            {
                let guard = self.lock();
                // SAFETY: `waiter` is not moved until it is unlinked below.
                unsafe { guard.push(node) };
                fence(Ordering::SeqCst);
                if let Some(acquired) = try_acquire() {
                    // SAFETY: still valid, we hold the queue lock.
                    unsafe { guard.unlink(node) };
                    return Ok(acquired);
                }
            }

            #[cfg(feature = "tracing")]
            tracing::trace!(target: "hoh::sync", parked = self.len(), "parking on contended lock");
            thread::park();

            {
                let guard = self.lock();
                // SAFETY: `waiter` is still on this stack frame.
                unsafe { guard.unlink(node) };
            }
            if interrupt::take() {
                #[cfg(feature = "tracing")]
                tracing::trace!(target: "hoh::sync", "lock wait abandoned after interrupt");
                return Err(Interrupted);
            }
            backoff.reset();
        }
    }

    /// Wakes every parked thread if there is one.
    ///
    /// Must be called after the lock state change that may let waiters proceed.
    pub(crate) fn notify(&self) {
        fence(Ordering::SeqCst);
        if self.len() == 0 {
            return;
        }
        self.lock().wake_all();
    }
}
