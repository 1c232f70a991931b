//! Dining philosophers.
//!
//! A companion exercise to the list: philosophers sit around a table with one
//! fork between each pair of neighbours and need both adjacent forks to eat.
//! Forks are write locks of any [`LockStrategy`](crate::LockStrategy), and the
//! simulation is stopped cooperatively by interrupting every philosopher thread.
//! It shares no state with [`crate::collections`].

mod config;
mod philosopher;
mod table;

pub use config::{ConfigError, ForkPolicy, SimulationConfig};
pub use philosopher::{Dinner, Philosopher, PhilosopherHandle, Table};
pub use table::{TableFormatter, TableLog};
