use super::config::{ConfigError, ForkPolicy, SimulationConfig};
use super::table::TableLog;
use crate::concurrency::interrupt::{self, InterruptHandle};
use crate::concurrency::sync::{LockStrategy, ReentrantRwLock, WriteGuard};
use crate::error::Interrupted;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// One place at the table: the fork to the philosopher's right and what they are doing.
struct Place<L> {
    fork: L,
    eating: AtomicBool,
    meals: AtomicU64,
}

impl<L: LockStrategy> Place<L> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            fork: L::default(),
            eating: AtomicBool::new(false),
            meals: AtomicU64::new(0),
        })
    }
}

/// State shared by everybody at the table.
pub struct Table {
    config: SimulationConfig,
    monitor: Mutex<()>,
    changed: Condvar,
    log: Option<TableLog>,
}

impl Table {
    /// A table for `config`, optionally printing every state change to `log`.
    pub fn new(config: SimulationConfig, log: Option<TableLog>) -> Arc<Self> {
        Arc::new(Self {
            config,
            monitor: Mutex::new(()),
            changed: Condvar::new(),
            log,
        })
    }

    /// The configuration the table was set with.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }
}

/// A philosopher alternating between thinking and eating.
///
/// Eating needs the left neighbour's fork and the philosopher's own fork. How
/// the two are taken without deadlocking is decided by the table's
/// [`ForkPolicy`].
pub struct Philosopher<L: LockStrategy = ReentrantRwLock> {
    seat: usize,
    place: Arc<Place<L>>,
    left: Option<Neighbor<L>>,
    right: Option<Neighbor<L>>,
    table: Arc<Table>,
}

/// A neighbour's seat and place.
struct Neighbor<L> {
    seat: usize,
    place: Arc<Place<L>>,
}

impl<L> Clone for Neighbor<L> {
    fn clone(&self) -> Self {
        Self {
            seat: self.seat,
            place: Arc::clone(&self.place),
        }
    }
}

impl<L: LockStrategy + 'static> Philosopher<L> {
    /// A philosopher at `table`, seated at 0 with no neighbours yet.
    pub fn new(table: &Arc<Table>) -> Self {
        Self {
            seat: 0,
            place: Place::new(),
            left: None,
            right: None,
            table: Arc::clone(table),
        }
    }

    /// Sets the seat index used in the table output.
    pub fn set_seat(&mut self, seat: usize) {
        self.seat = seat;
    }

    /// The seat index.
    pub fn seat(&self) -> usize {
        self.seat
    }

    /// Meals eaten so far.
    pub fn meals(&self) -> u64 {
        self.place.meals.load(Ordering::Relaxed)
    }

    /// Introduces the neighbours. The left neighbour's fork is shared with this philosopher.
    ///
    /// Seats must already be assigned: forks are ordered by seat.
    pub fn set_neighbors(&mut self, left: &Self, right: &Self) {
        self.left = Some(left.as_neighbor());
        self.right = Some(right.as_neighbor());
    }

    fn as_neighbor(&self) -> Neighbor<L> {
        Neighbor {
            seat: self.seat,
            place: Arc::clone(&self.place),
        }
    }

    /// Starts dining on an interruptible thread.
    ///
    /// # Panics
    /// Panics if [`set_neighbors`](Self::set_neighbors) was not called.
    pub fn spawn(self) -> PhilosopherHandle {
        let (Some(left), Some(right)) = (self.left.clone(), self.right.clone()) else {
            panic!("philosopher {} has no neighbours", self.seat);
        };
        let stopped = Arc::new(AtomicBool::new(false));
        let seat = self.seat;
        let flag = Arc::clone(&stopped);
        let (join, interrupt) = interrupt::spawn(move || {
            let dining = Dining {
                philosopher: self,
                left,
                right,
                stopped: flag,
            };
            dining.run()
        });
        PhilosopherHandle {
            seat,
            stopped,
            interrupt,
            join,
        }
    }
}

/// A running philosopher.
pub struct PhilosopherHandle {
    seat: usize,
    stopped: Arc<AtomicBool>,
    interrupt: InterruptHandle,
    join: JoinHandle<u64>,
}

impl PhilosopherHandle {
    /// The philosopher's seat.
    pub fn seat(&self) -> usize {
        self.seat
    }

    /// Asks the philosopher to stop and interrupts whatever they are waiting on.
    ///
    /// Forks held at that moment are released as the philosopher unwinds.
    pub fn stop_simulation(&self) {
        self.stopped.store(true, Ordering::Release);
        self.interrupt.interrupt();
    }

    /// Waits for the philosopher to leave and returns the meals eaten.
    ///
    /// Re-raises a panic from the philosopher's thread.
    pub fn join(self) -> u64 {
        self.join
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    }
}

/// The thread-side state of a seated philosopher.
struct Dining<L: LockStrategy> {
    philosopher: Philosopher<L>,
    left: Neighbor<L>,
    right: Neighbor<L>,
    stopped: Arc<AtomicBool>,
}

impl<L: LockStrategy> Dining<L> {
    fn run(self) -> u64 {
        while !self.stopped.load(Ordering::Acquire) {
            // An interrupt ends the current round; the loop re-checks the stop flag.
            let _ = self.round();
        }
        self.log("stopped");
        self.philosopher.place.meals.load(Ordering::Relaxed)
    }

    fn round(&self) -> Result<(), Interrupted> {
        let config = &self.philosopher.table.config;
        self.log("thinking");
        interrupt::sleep(random_duration(config.max_thinking_ms))?;
        self.log("waiting");
        match config.policy {
            ForkPolicy::Ordered => self.eat_ordered(),
            ForkPolicy::Waiter => self.eat_waiter(),
        }
    }

    fn eat_ordered(&self) -> Result<(), Interrupted> {
        let own = &self.philosopher.place;
        let (first, second) = if self.left.seat < self.philosopher.seat {
            (&self.left.place, own)
        } else {
            (own, &self.left.place)
        };
        let _first = WriteGuard::acquire(&first.fork)?;
        let _second = WriteGuard::acquire(&second.fork)?;
        own.eating.store(true, Ordering::Release);
        let meal = self.eat();
        own.eating.store(false, Ordering::Release);
        meal
    }

    fn eat_waiter(&self) -> Result<(), Interrupted> {
        let table = &self.philosopher.table;
        let own = &self.philosopher.place;
        {
            let mut seated = table.monitor.lock().unwrap_or_else(PoisonError::into_inner);
            while self.left.place.eating.load(Ordering::Acquire) || self.right.place.eating.load(Ordering::Acquire) {
                interrupt::check()?;
                seated = table
                    .changed
                    .wait_timeout(seated, table.config.taking())
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
            own.eating.store(true, Ordering::Release);
        }
        let meal = self.eat();
        {
            let _seated = table.monitor.lock().unwrap_or_else(PoisonError::into_inner);
            own.eating.store(false, Ordering::Release);
            table.changed.notify_all();
        }
        meal
    }

    fn eat(&self) -> Result<(), Interrupted> {
        self.log("eating");
        interrupt::sleep(random_duration(self.philosopher.table.config.max_eating_ms))?;
        self.philosopher.place.meals.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn log(&self, message: &str) {
        let seat = self.philosopher.seat;
        #[cfg(feature = "tracing")]
        tracing::debug!(target: "hoh::simulation", seat, "{message}");
        if let Some(log) = &self.philosopher.table.log {
            // Best effort: a broken sink does not stop the dinner.
            let _ = log.log(seat, message);
        }
    }
}

fn random_duration(max_ms: u64) -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

/// A whole table of philosophers, seated and running.
pub struct Dinner {
    philosophers: Vec<PhilosopherHandle>,
}

impl Dinner {
    /// Seats `config.seats` philosophers around one table and starts them.
    ///
    /// Forks are write locks of strategy `L`.
    ///
    /// # Errors
    /// Any error from [`SimulationConfig::validate`].
    pub fn start<L: LockStrategy + 'static>(
        config: SimulationConfig,
        log: Option<TableLog>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let seats = config.seats;
        let table = Table::new(config, log);
        let mut philosophers: Vec<Philosopher<L>> = (0..seats)
            .map(|seat| {
                let mut philosopher = Philosopher::new(&table);
                philosopher.set_seat(seat);
                philosopher
            })
            .collect();
        for seat in 0..seats {
            let left = philosophers[(seat + seats - 1) % seats].as_neighbor();
            let right = philosophers[(seat + 1) % seats].as_neighbor();
            philosophers[seat].left = Some(left);
            philosophers[seat].right = Some(right);
        }
        #[cfg(feature = "tracing")]
        tracing::info!(target: "hoh::simulation", seats, lock = L::NAME, "dinner started");
        Ok(Self {
            philosophers: philosophers.into_iter().map(Philosopher::spawn).collect(),
        })
    }

    /// Number of seats.
    pub fn seats(&self) -> usize {
        self.philosophers.len()
    }

    /// Stops every philosopher, waits for all of them, and returns meals per seat.
    pub fn stop(self) -> Vec<u64> {
        for philosopher in &self.philosophers {
            philosopher.stop_simulation();
        }
        self.philosophers.into_iter().map(PhilosopherHandle::join).collect()
    }
}
