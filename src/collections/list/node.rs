//! List nodes and the per-node hold used by hand-over-hand traversal.

use crate::concurrency::sync::{LockStrategy, Stamp};
use crate::error::Interrupted;
use std::cell::UnsafeCell;
use std::ptr::{self, NonNull};
use std::sync::OnceLock;

/// One list slot.
///
/// - `element` is read under the node's read lock and written under its write lock.
/// - `next` is set at most once, under the node's write lock, and never changes
///   afterwards. `OnceLock` makes the lock-free load on the optimistic path sound.
/// - `prev` is a non-owning back-reference fixed at construction. Nodes are only
///   freed when the whole list is dropped, so it never dangles while reachable.
pub(crate) struct Node<T, L> {
    element: UnsafeCell<T>,
    prev: Option<NonNull<Node<T, L>>>,
    next: OnceLock<Box<Node<T, L>>>,
    lock: L,
}

// SAFETY: `element` is only accessed under `lock`, `prev` is immutable and
// points into the same list, `next` is a `OnceLock`.
unsafe impl<T: Send, L: Send> Send for Node<T, L> {}
unsafe impl<T: Send + Sync, L: Sync> Sync for Node<T, L> {}

impl<T, L: LockStrategy> Node<T, L> {
    pub(crate) fn new(element: T, prev: Option<&Node<T, L>>) -> Box<Self> {
        Box::new(Self {
            element: UnsafeCell::new(element),
            prev: prev.map(NonNull::from),
            next: OnceLock::new(),
            lock: L::default(),
        })
    }

    /// The successor, read without locking.
    #[inline]
    pub(crate) fn next(&self) -> Option<&Node<T, L>> {
        self.next.get().map(|node| &**node)
    }

    /// The predecessor this node was appended to.
    #[inline]
    pub(crate) fn prev(&self) -> Option<&Node<T, L>> {
        // SAFETY: the predecessor owns `self` (directly, through its `next`), so
        // it lives at least as long as this borrow.
        self.prev.map(|prev| unsafe { prev.as_ref() })
    }

    #[inline]
    pub(crate) fn lock(&self) -> &L {
        &self.lock
    }

    /// Detaches the successor chain so it can be dropped iteratively.
    pub(crate) fn take_next(&mut self) -> Option<Box<Node<T, L>>> {
        self.next.take()
    }
}

/// What a [`NodeGuard`] currently holds on its node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Hold {
    /// A validated optimistic stamp; nothing to release.
    Optimistic(Stamp),
    Read(Stamp),
    Write(Stamp),
    Released,
}

/// A thread's position in a hand-over-hand traversal.
///
/// Holds exactly one node, either optimistically (validated stamp, no lock) or
/// under a read or write lock. Dropping the guard releases whatever it holds,
/// so every early return and every unwinding panic leaves the node unlocked.
pub(crate) struct NodeGuard<'a, T, L: LockStrategy> {
    node: &'a Node<T, L>,
    hold: Hold,
}

impl<'a, T, L: LockStrategy> NodeGuard<'a, T, L> {
    /// Takes `node` optimistically, or blocks for its read lock if a writer is active.
    pub(crate) fn pin(node: &'a Node<T, L>) -> Result<Self, Interrupted> {
        let stamp = node.lock.try_optimistic_read();
        let hold = if node.lock.validate(stamp) {
            Hold::Optimistic(stamp)
        } else {
            Hold::Read(node.lock.acquire_read()?)
        };
        Ok(Self { node, hold })
    }

    #[inline]
    pub(crate) fn node(&self) -> &'a Node<T, L> {
        self.node
    }

    /// Moves to `next`, the current node's successor.
    ///
    /// The successor is pinned before the current node is let go; the trailing
    /// hold is released through the successor's back-reference. If pinning is
    /// interrupted, `self` is dropped and its hold released on the way out.
    pub(crate) fn hand_over(mut self, next: &'a Node<T, L>) -> Result<Self, Interrupted> {
        let successor = Self::pin(next)?;
        let trailing = std::mem::replace(&mut self.hold, Hold::Released);
        match successor.node.prev() {
            Some(prev) => {
                debug_assert!(ptr::eq(prev, self.node), "successor linked to a foreign node");
                release(prev.lock(), trailing);
            }
            None => release(self.node.lock(), trailing),
        }
        Ok(successor)
    }

    /// Makes sure the node is held under a blocking read (or write) lock.
    pub(crate) fn into_read(mut self) -> Result<Self, Interrupted> {
        if let Hold::Optimistic(_) | Hold::Released = self.hold {
            self.hold = Hold::Read(self.node.lock.acquire_read()?);
        }
        Ok(self)
    }

    /// Turns the hold into the node's write lock.
    ///
    /// Tries an in-place conversion first. If it is rejected, the read lock (if
    /// any) is released and the write lock is taken by blocking; in that case
    /// the node may have changed in the unlocked window and callers must
    /// re-check what they depend on.
    pub(crate) fn upgrade(&mut self) -> Result<(), Interrupted> {
        let stamp = match self.hold {
            Hold::Write(_) => return Ok(()),
            Hold::Optimistic(stamp) | Hold::Read(stamp) => stamp,
            Hold::Released => Stamp::INVALID,
        };
        if let Some(write) = self.node.lock.try_upgrade_to_write(stamp) {
            self.hold = Hold::Write(write);
            return Ok(());
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(target: "hoh::list", lock = L::NAME, "upgrade rejected, blocking for the write lock");
        release(&self.node.lock, std::mem::replace(&mut self.hold, Hold::Released));
        self.hold = Hold::Write(self.node.lock.acquire_write()?);
        Ok(())
    }

    /// The element. Requires a read or write lock.
    pub(crate) fn element(&self) -> &T {
        assert!(
            matches!(self.hold, Hold::Read(_) | Hold::Write(_)),
            "element read without a lock"
        );
        // SAFETY: a read or write lock excludes writers.
        unsafe { &*self.node.element.get() }
    }

    /// The element, mutably. Requires the write lock.
    pub(crate) fn element_mut(&mut self) -> &mut T {
        assert!(matches!(self.hold, Hold::Write(_)), "element written without the write lock");
        // SAFETY: the write lock excludes every other access, and `&mut self`
        // prevents a second borrow through this guard.
        unsafe { &mut *self.node.element.get() }
    }

    /// Links a new node after this one. Requires the write lock and no successor.
    pub(crate) fn append(&self, element: T) {
        assert!(matches!(self.hold, Hold::Write(_)), "append without the write lock");
        let installed = self.node.next.set(Node::new(element, Some(self.node))).is_ok();
        assert!(installed, "append to a node that already has a successor");
    }
}

impl<T, L: LockStrategy> Drop for NodeGuard<'_, T, L> {
    fn drop(&mut self) {
        release(&self.node.lock, self.hold);
    }
}

fn release<L: LockStrategy>(lock: &L, hold: Hold) {
    match hold {
        Hold::Read(stamp) => lock.release_read(stamp),
        Hold::Write(stamp) => lock.release_write(stamp),
        Hold::Optimistic(_) | Hold::Released => {}
    }
}
