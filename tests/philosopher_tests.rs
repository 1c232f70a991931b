use hoh::simulation::{ConfigError, Dinner, ForkPolicy, Philosopher, SimulationConfig, Table, TableFormatter, TableLog};
use hoh::{ReentrantRwLock, StampedLock};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// An in-memory sink the test can inspect after the dinner.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn quick(policy: ForkPolicy) -> SimulationConfig {
    SimulationConfig {
        seats: 5,
        max_thinking_ms: 5,
        max_eating_ms: 5,
        max_taking_ms: 1,
        policy,
        column_width: 25,
    }
}

#[test]
fn ordered_dinner_feeds_the_table() {
    let dinner = Dinner::start::<StampedLock>(quick(ForkPolicy::Ordered), None).unwrap();
    assert_eq!(dinner.seats(), 5);
    thread::sleep(Duration::from_millis(300));
    let meals = dinner.stop();
    assert_eq!(meals.len(), 5);
    assert!(meals.iter().sum::<u64>() > 0, "nobody ate: {meals:?}");
}

#[test]
fn waiter_dinner_feeds_the_table() {
    let dinner = Dinner::start::<ReentrantRwLock>(quick(ForkPolicy::Waiter), None).unwrap();
    thread::sleep(Duration::from_millis(300));
    let meals = dinner.stop();
    assert!(meals.iter().sum::<u64>() > 0, "nobody ate: {meals:?}");
}

#[test]
fn stop_interrupts_long_sleeps() {
    let config = SimulationConfig {
        max_thinking_ms: 60_000,
        max_eating_ms: 60_000,
        ..quick(ForkPolicy::Ordered)
    };
    let dinner = Dinner::start::<StampedLock>(config, None).unwrap();
    thread::sleep(Duration::from_millis(100));
    let started = Instant::now();
    dinner.stop();
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn table_rows_are_well_formed() {
    let sink = Captured::default();
    let config = quick(ForkPolicy::Ordered);
    let log = TableLog::new(TableFormatter::new(config.seats, config.column_width), sink.clone());
    let dinner = Dinner::start::<StampedLock>(config, Some(log)).unwrap();
    thread::sleep(Duration::from_millis(100));
    dinner.stop();

    let text = sink.text();
    let separator = format!("{}+", format!("+{}", "-".repeat(24)).repeat(5));
    let lines: Vec<_> = text.lines().collect();
    assert!(lines.len() >= 10);
    for pair in lines.chunks(2) {
        assert!(pair[0].starts_with('|') && pair[0].ends_with('|'), "bad row: {}", pair[0]);
        assert_eq!(pair[0].len(), 1 + 5 * 25);
        assert_eq!(pair[1], separator);
    }
    assert_eq!(text.matches(" stopped|").count(), 5);
}

#[test]
fn invalid_config_is_rejected() {
    let config = SimulationConfig {
        seats: 1,
        ..SimulationConfig::default()
    };
    assert!(matches!(
        Dinner::start::<StampedLock>(config, None),
        Err(ConfigError::TooFewSeats(1))
    ));
}

#[test]
fn two_philosophers_share_both_forks() {
    let table = Table::new(quick(ForkPolicy::Ordered), None);
    let mut plato: Philosopher<StampedLock> = Philosopher::new(&table);
    let mut kant: Philosopher<StampedLock> = Philosopher::new(&table);
    plato.set_seat(0);
    kant.set_seat(1);
    plato.set_neighbors(&kant, &kant);
    kant.set_neighbors(&plato, &plato);

    let handles = [plato.spawn(), kant.spawn()];
    thread::sleep(Duration::from_millis(200));
    for handle in &handles {
        handle.stop_simulation();
    }
    let meals: u64 = handles.into_iter().map(|handle| handle.join()).sum();
    assert!(meals > 0);
}
