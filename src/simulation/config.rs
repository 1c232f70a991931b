//! Dining-table configuration.

use core::fmt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How philosophers avoid deadlock while taking forks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForkPolicy {
    /// Resource hierarchy: both forks are taken in increasing seat order.
    #[default]
    Ordered,
    /// A table monitor lets a philosopher eat only while neither neighbour eats.
    Waiter,
}

/// Parameters of a dining-philosophers run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of philosophers (and forks).
    pub seats: usize,
    /// Upper bound of one thinking phase, in milliseconds.
    pub max_thinking_ms: u64,
    /// Upper bound of one meal, in milliseconds.
    pub max_eating_ms: u64,
    /// How long a waiting philosopher sleeps before re-checking the table.
    pub max_taking_ms: u64,
    /// Deadlock-avoidance policy.
    pub policy: ForkPolicy,
    /// Width of one seat column in the console table.
    pub column_width: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seats: 5,
            max_thinking_ms: 100,
            max_eating_ms: 100,
            max_taking_ms: 10,
            policy: ForkPolicy::default(),
            column_width: 25,
        }
    }
}

impl SimulationConfig {
    /// Parses a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    /// [`ConfigError::Parse`] for malformed JSON, or any error from
    /// [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the simulation cannot run with.
    ///
    /// # Errors
    /// [`ConfigError::TooFewSeats`] for fewer than two seats,
    /// [`ConfigError::ZeroDuration`] for a zero `max_taking_ms`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seats < 2 {
            return Err(ConfigError::TooFewSeats(self.seats));
        }
        if self.max_taking_ms == 0 {
            return Err(ConfigError::ZeroDuration("max_taking_ms"));
        }
        Ok(())
    }

    pub(crate) fn taking(&self) -> Duration {
        Duration::from_millis(self.max_taking_ms)
    }
}

/// Invalid simulation configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    Parse(serde_json::Error),
    /// A table needs at least two seats.
    TooFewSeats(usize),
    /// The named duration must be positive.
    ZeroDuration(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid simulation config: {err}"),
            Self::TooFewSeats(n) => write!(f, "a table needs at least 2 seats, got {n}"),
            Self::ZeroDuration(field) => write!(f, "`{field}` must be greater than zero"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = SimulationConfig::from_json(r#"{ "seats": 3, "policy": "waiter" }"#).unwrap();
        assert_eq!(config.seats, 3);
        assert_eq!(config.policy, ForkPolicy::Waiter);
        assert_eq!(config.max_eating_ms, SimulationConfig::default().max_eating_ms);
    }

    #[test]
    fn rejects_lonely_philosopher() {
        let err = SimulationConfig::from_json(r#"{ "seats": 1 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::TooFewSeats(1)));
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = SimulationConfig::from_json(r#"{ "policy": "chaos" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
