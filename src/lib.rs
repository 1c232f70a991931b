//! # `hoh` - Hand-over-hand locked concurrent list
//!
//! A singly linked list that lets many threads read and mutate different parts of
//! the same list at once. Instead of one lock around the whole list, every node
//! carries its own lock and traversals use *lock coupling*: a thread pins the next
//! node before letting go of the current one, and never holds more than two.
//!
//! ## Lock strategies
//!
//! The per-node lock is a type parameter implementing [`LockStrategy`]:
//!
//! - [`StampedLock`]: a version counter with lock-free optimistic reads that are
//!   validated afterwards, blocking read/write locks as fallback, and in-place
//!   conversion of a read into a write.
//! - [`ReentrantRwLock`]: a plain reentrant shared/exclusive lock. Every step of a
//!   traversal blocks for a read lock. Useful as a baseline.
//!
//! Both block by parking on an internal queue and give up when the waiting thread
//! is interrupted through an [`InterruptHandle`], unwinding every lock the
//! operation held.
//!
//! ## Guarantees
//!
//! - A node's element and successor link are only written under the node's write
//!   lock; the head reference only under the head guard's write lock.
//! - A traversal holds at most two adjacent nodes and releases the trailing one
//!   only after the leading one is held.
//! - Nodes are appended, never removed; the list only grows.
//! - Every operation releases everything it acquired on every exit path.
//!
//! ## Example
//!
//! ```rust
//! use hoh::{ConcurrentList, ReentrantRwLock};
//! use std::thread;
//!
//! let list: ConcurrentList<u32, ReentrantRwLock> = ConcurrentList::new();
//! thread::scope(|s| {
//!     for t in 0..4 {
//!         let list = &list;
//!         s.spawn(move || {
//!             for i in 0..10 {
//!                 list.add(t * 100 + i).unwrap();
//!             }
//!         });
//!     }
//! });
//! assert_eq!(list.len().unwrap(), 40);
//! assert!(list.is_unlocked());
//! ```
//!
//! The [`simulation`] module holds an unrelated companion exercise: a dining
//! philosophers table whose forks are the same lock strategies.

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod collections;
pub mod concurrency;
pub mod error;
pub mod simulation;

pub use collections::{ConcurrentList, OptimisticList, RwList, SimulateWork};
pub use concurrency::{InterruptHandle, LockStrategy, ReentrantRwLock, Stamp, StampedLock};
pub use error::{Interrupted, ListError};

// Compile-time layout checks.
const _: () = {
    use core::mem;

    // A stamp is a plain word.
    assert!(mem::size_of::<Stamp>() == mem::size_of::<u64>());

    // Lock state stays small: one state word, the wait queue, nothing boxed.
    assert!(mem::size_of::<StampedLock>() <= mem::size_of::<usize>() * 8);
    assert!(mem::size_of::<ReentrantRwLock>() <= mem::size_of::<usize>() * 8);
};
