//! Concurrent collections built on the lock strategies in [`crate::concurrency::sync`].

pub mod list;

pub use list::work::{Counted, Identity, SimulateWork, Sleep, Spin};
pub use list::{ConcurrentList, OptimisticList, RwList};
