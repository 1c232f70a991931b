//! `ConcurrentList` — a singly linked list with per-node hand-over-hand locking.
//!
//! Each node carries its own [`LockStrategy`] instance; a separate head guard of
//! the same strategy protects only the head reference. Operations snapshot the
//! head under the head guard, then walk forward holding at most two adjacent
//! nodes: the successor is pinned before the predecessor is let go. The terminal
//! node is read under its read lock or mutated under its write lock.
//!
//! Two threads working at different positions only meet on the shared prefix
//! they both walk through, and with [`StampedLock`] that prefix is crossed with
//! optimistic stamps that never block anybody.
//!
//! # Example
//!
//! ```rust
//! use hoh::OptimisticList;
//!
//! let list = OptimisticList::new();
//! assert!(list.is_empty()?);
//! list.add("a")?;
//! list.add("b")?;
//! assert_eq!(list.set(0, "c")?, Some("c"));
//! assert_eq!(list.get(0)?, Some("c"));
//! assert_eq!(list.get(1)?, Some("b"));
//! # Ok::<(), hoh::ListError>(())
//! ```

mod node;
pub mod work;


use self::node::{Node, NodeGuard};
use self::work::{Identity, SimulateWork};
use crate::concurrency::sync::{LockStrategy, ReadGuard, ReentrantRwLock, StampedLock, WriteGuard};
use crate::error::ListError;
use core::fmt;
use crossbeam_utils::CachePadded;
use std::sync::OnceLock;

/// A list whose nodes use [`StampedLock`]: optimistic traversal, in-place upgrades.
pub type OptimisticList<T, W = Identity> = ConcurrentList<T, StampedLock, W>;

/// A list whose nodes use [`ReentrantRwLock`]: every step blocks for a read lock.
pub type RwList<T, W = Identity> = ConcurrentList<T, ReentrantRwLock, W>;

/// A grow-only linked list safe for concurrent `get`, `add` and `set`.
///
/// - `L` is the lock strategy used for the head guard and for every node.
/// - `W` is applied to every element returned by [`get`](Self::get).
///
/// Indices are not validated up front: walking past the tail reports
/// [`ListError::IndexOutOfRange`]. Every operation releases all locks it took
/// before returning, including on errors and panics.
pub struct ConcurrentList<T, L: LockStrategy = StampedLock, W = Identity> {
    head: OnceLock<Box<Node<T, L>>>,
    head_guard: CachePadded<L>,
    work: W,
}

impl<T, L: LockStrategy> ConcurrentList<T, L, Identity> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::with_work(Identity)
    }
}

impl<T, L: LockStrategy> Default for ConcurrentList<T, L, Identity> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, L: LockStrategy, W: SimulateWork<T>> ConcurrentList<T, L, W> {
    /// Creates an empty list that passes every returned element through `work`.
    pub fn with_work(work: W) -> Self {
        Self {
            head: OnceLock::new(),
            head_guard: CachePadded::new(L::default()),
            work,
        }
    }

    /// The work collaborator.
    pub fn work(&self) -> &W {
        &self.work
    }

    /// Snapshots the head reference under the head guard.
    fn head(&self) -> Result<Option<&Node<T, L>>, ListError> {
        let stamp = self.head_guard.try_optimistic_read();
        let head = self.head.get();
        if self.head_guard.validate(stamp) {
            return Ok(head.map(|node| &**node));
        }
        let _read = ReadGuard::acquire(&*self.head_guard)?;
        Ok(self.head.get().map(|node| &**node))
    }

    /// Installs the first node. Hands `element` back if another thread won the race.
    fn install_head(&self, element: T) -> Result<Option<T>, ListError> {
        let _write = WriteGuard::acquire(&*self.head_guard)?;
        if self.head.get().is_some() {
            return Ok(Some(element));
        }
        let installed = self.head.set(Node::new(element, None)).is_ok();
        debug_assert!(installed);
        Ok(None)
    }

    /// Walks from `head` to `index`, holding only the node reached.
    fn walk_to<'a>(&'a self, head: &'a Node<T, L>, index: usize) -> Result<NodeGuard<'a, T, L>, ListError> {
        let mut guard = NodeGuard::pin(head)?;
        for position in 0..index {
            let Some(next) = guard.node().next() else {
                return Err(ListError::IndexOutOfRange { index, len: position + 1 });
            };
            guard = guard.hand_over(next)?;
        }
        Ok(guard)
    }

    /// Walks forward from `guard` until the held node has no successor.
    fn walk_to_tail<'a>(&'a self, mut guard: NodeGuard<'a, T, L>) -> Result<NodeGuard<'a, T, L>, ListError> {
        while let Some(next) = guard.node().next() {
            guard = guard.hand_over(next)?;
        }
        Ok(guard)
    }

    /// Returns `true` if the list has no nodes.
    ///
    /// # Errors
    /// [`ListError::Interrupted`] if blocking on the head guard was interrupted.
    pub fn is_empty(&self) -> Result<bool, ListError> {
        Ok(self.head()?.is_none())
    }

    /// Returns the element at `index`, passed through the work collaborator.
    ///
    /// Returns `Ok(None)` for an empty list.
    ///
    /// # Errors
    /// [`ListError::IndexOutOfRange`] if the list is non-empty and shorter than
    /// `index + 1`; [`ListError::Interrupted`] if a lock wait was interrupted.
    pub fn get(&self, index: usize) -> Result<Option<T>, ListError>
    where
        T: Clone,
    {
        let Some(head) = self.head()? else {
            return Ok(None);
        };
        let guard = self.walk_to(head, index)?.into_read()?;
        Ok(Some(self.work.simulate(guard.element().clone())))
    }

    /// Appends `element` at the tail. Always returns `Ok(true)` on success.
    ///
    /// # Errors
    /// [`ListError::Interrupted`] if a lock wait was interrupted; the element is
    /// dropped and the list is unchanged.
    pub fn add(&self, element: T) -> Result<bool, ListError> {
        let mut element = element;
        let head = loop {
            if let Some(head) = self.head()? {
                break head;
            }
            match self.install_head(element)? {
                None => return Ok(true),
                Some(rejected) => element = rejected,
            }
        };

        let mut tail = self.walk_to_tail(NodeGuard::pin(head)?)?;
        loop {
            tail.upgrade()?;
            match tail.node().next() {
                None => break,
                Some(next) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(target: "hoh::list", "tail moved while upgrading, walking on");
                    tail = self.walk_to_tail(tail.hand_over(next)?)?;
                }
            }
        }
        tail.append(element);
        Ok(true)
    }

    /// Overwrites the element at `index` and returns the value just written.
    ///
    /// Returns `Ok(None)` for an empty list. See [`replace`](Self::replace) for
    /// the variant that returns the previous value.
    ///
    /// # Errors
    /// Same as [`get`](Self::get).
    pub fn set(&self, index: usize, element: T) -> Result<Option<T>, ListError>
    where
        T: Clone,
    {
        let Some(head) = self.head()? else {
            return Ok(None);
        };
        let mut guard = self.walk_to(head, index)?;
        guard.upgrade()?;
        *guard.element_mut() = element.clone();
        Ok(Some(element))
    }

    /// Overwrites the element at `index` and returns the previous value.
    ///
    /// Returns `Ok(None)` for an empty list, in which case `element` is dropped.
    ///
    /// # Errors
    /// Same as [`get`](Self::get).
    pub fn replace(&self, index: usize, element: T) -> Result<Option<T>, ListError> {
        let Some(head) = self.head()? else {
            return Ok(None);
        };
        let mut guard = self.walk_to(head, index)?;
        guard.upgrade()?;
        Ok(Some(std::mem::replace(guard.element_mut(), element)))
    }

    /// Counts the nodes by walking the whole list.
    ///
    /// # Errors
    /// [`ListError::Interrupted`] if a lock wait was interrupted.
    pub fn len(&self) -> Result<usize, ListError> {
        let Some(head) = self.head()? else {
            return Ok(0);
        };
        let mut len = 1;
        let mut guard = NodeGuard::pin(head)?;
        while let Some(next) = guard.node().next() {
            guard = guard.hand_over(next)?;
            len += 1;
        }
        Ok(len)
    }

    /// Clones every element, front to back, each under its node's read lock.
    ///
    /// The work collaborator is not applied. Concurrent appends that land behind
    /// the walk are included; the result is not an atomic snapshot.
    ///
    /// # Errors
    /// [`ListError::Interrupted`] if a lock wait was interrupted.
    pub fn to_vec(&self) -> Result<Vec<T>, ListError>
    where
        T: Clone,
    {
        let mut out = Vec::new();
        let Some(head) = self.head()? else {
            return Ok(out);
        };
        let mut guard = NodeGuard::pin(head)?.into_read()?;
        loop {
            out.push(guard.element().clone());
            match guard.node().next() {
                Some(next) => guard = guard.hand_over(next)?.into_read()?,
                None => return Ok(out),
            }
        }
    }

    /// Returns `true` if the head guard and every node lock are currently free.
    ///
    /// Diagnostic only: walks without locking, so the answer is stale as soon as
    /// another thread touches the list.
    pub fn is_unlocked(&self) -> bool {
        if self.head_guard.is_locked() {
            return false;
        }
        let mut cur = self.head.get().map(|node| &**node);
        while let Some(node) = cur {
            if node.lock().is_locked() {
                return false;
            }
            cur = node.next();
        }
        true
    }
}

impl<T, L: LockStrategy, W> Drop for ConcurrentList<T, L, W> {
    fn drop(&mut self) {
        // Unlink iteratively; the default recursive drop overflows on long lists.
        let mut cur = self.head.take();
        while let Some(mut node) = cur {
            cur = node.take_next();
        }
    }
}

impl<T, L: LockStrategy, W> fmt::Debug for ConcurrentList<T, L, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentList")
            .field("lock", &L::NAME)
            .field("empty", &self.head.get().is_none())
            .finish_non_exhaustive()
    }
}
