//! Error types shared by the lock strategies and the list.

use core::fmt;

/// A blocking lock acquisition was abandoned because the waiting thread was interrupted.
///
/// Returned after the waiter has unlinked itself from the lock's wait queue, so no
/// lock state is left behind. Receiving this error consumes the thread's interrupt
/// status (see [`crate::concurrency::interrupt`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("interrupted while waiting for a lock")
    }
}

impl std::error::Error for Interrupted {}

/// The error type for [`ConcurrentList`](crate::ConcurrentList) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListError {
    /// The traversal ran past the tail.
    ///
    /// `len` is the number of nodes the traversal observed. Because the list only
    /// grows, the list may be longer by the time the caller inspects the error.
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Nodes observed before the successor was found absent.
        len: usize,
    },
    /// A blocking lock wait was interrupted; every lock taken by the operation
    /// has been released.
    Interrupted,
}

impl fmt::Display for ListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index out of range: the index is {index} but the length is {len}")
            }
            Self::Interrupted => fmt::Display::fmt(&Interrupted, f),
        }
    }
}

impl std::error::Error for ListError {}

impl From<Interrupted> for ListError {
    fn from(_: Interrupted) -> Self {
        Self::Interrupted
    }
}
