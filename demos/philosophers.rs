//! Runs a dining-philosophers table and prints every state change.
//!
//! ```text
//! cargo run --example philosophers -- --seats 5 --seconds 3 --policy waiter
//! cargo run --example philosophers -- --config table.json --lock stamped
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use hoh::simulation::{Dinner, ForkPolicy, SimulationConfig, TableFormatter, TableLog};
use hoh::{ReentrantRwLock, StampedLock};
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

#[derive(Clone, Copy, ValueEnum)]
enum Lock {
    Stamped,
    Rwlock,
}

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    Ordered,
    Waiter,
}

#[derive(Parser)]
#[command(name = "philosophers")]
#[command(about = "Dining philosophers on hand-over-hand locks", long_about = None)]
struct Cli {
    /// JSON configuration; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of philosophers
    #[arg(long)]
    seats: Option<usize>,

    /// Deadlock-avoidance policy
    #[arg(long, value_enum)]
    policy: Option<Policy>,

    /// Lock strategy used for the forks
    #[arg(long, value_enum, default_value_t = Lock::Rwlock)]
    lock: Lock,

    /// How long the dinner lasts
    #[arg(long, default_value_t = 5)]
    seconds: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            SimulationConfig::from_json(&json)?
        }
        None => SimulationConfig::default(),
    };
    if let Some(seats) = cli.seats {
        config.seats = seats;
    }
    if let Some(policy) = cli.policy {
        config.policy = match policy {
            Policy::Ordered => ForkPolicy::Ordered,
            Policy::Waiter => ForkPolicy::Waiter,
        };
    }

    let log = TableLog::new(TableFormatter::new(config.seats, config.column_width), std::io::stdout());
    let dinner = match cli.lock {
        Lock::Stamped => Dinner::start::<StampedLock>(config, Some(log))?,
        Lock::Rwlock => Dinner::start::<ReentrantRwLock>(config, Some(log))?,
    };

    thread::sleep(Duration::from_secs(cli.seconds));
    let meals = dinner.stop();

    println!();
    for (seat, meals) in meals.iter().enumerate() {
        println!("philosopher {seat}: {meals} meals");
    }
    Ok(())
}
