//! Persistence configuration.
//!
//! Values are read from environment variables:
//!
//! - `CHRONICLE_SERIALIZATION_STRATEGY`: `snapshot-only`, `event-only`,
//!   `hybrid` or `hybrid:N` (default `hybrid`).
//! - `CHRONICLE_EVENTS_PER_SNAPSHOT`: threshold for a bare `hybrid`
//!   (default 10).

use std::num::NonZeroU64;

use thiserror::Error;

use crate::strategy::StrategyKind;

/// Environment variable selecting the serialization strategy.
pub const CHRONICLE_SERIALIZATION_STRATEGY: &str = "CHRONICLE_SERIALIZATION_STRATEGY";

/// Environment variable holding the hybrid snapshot threshold.
pub const CHRONICLE_EVENTS_PER_SNAPSHOT: &str = "CHRONICLE_EVENTS_PER_SNAPSHOT";

/// Snapshot threshold used when none is configured.
pub const DEFAULT_EVENTS_PER_SNAPSHOT: u64 = 10;

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The strategy name is not one of the supported policies.
    #[error("unknown serialization strategy: {0:?}")]
    UnknownStrategy(String),

    /// A numeric setting is missing, malformed or zero.
    #[error("invalid value for {name}: {value:?} (expected a positive integer)")]
    InvalidNumber {
        /// Setting name.
        name: String,
        /// The rejected raw value.
        value: String,
    },
}

/// Persistence settings for repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceConfig {
    /// Policy every repository built from this config uses.
    pub strategy: StrategyKind,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Hybrid(default_events_per_snapshot()),
        }
    }
}

impl PersistenceConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let threshold = match lookup(CHRONICLE_EVENTS_PER_SNAPSHOT) {
            Some(raw) => parse_threshold(CHRONICLE_EVENTS_PER_SNAPSHOT, &raw)?,
            None => default_events_per_snapshot(),
        };
        let strategy = match lookup(CHRONICLE_SERIALIZATION_STRATEGY) {
            Some(raw) => match raw.parse::<StrategyKind>()? {
                StrategyKind::Hybrid(_) if !raw.contains(':') => StrategyKind::Hybrid(threshold),
                other => other,
            },
            None => StrategyKind::Hybrid(threshold),
        };
        Ok(Self { strategy })
    }
}

pub(crate) fn default_events_per_snapshot() -> NonZeroU64 {
    NonZeroU64::new(DEFAULT_EVENTS_PER_SNAPSHOT).unwrap_or(NonZeroU64::MIN)
}

pub(crate) fn parse_threshold(name: &str, raw: &str) -> Result<NonZeroU64, ConfigError> {
    raw.trim()
        .parse::<NonZeroU64>()
        .map_err(|_| ConfigError::InvalidNumber {
            name: name.to_owned(),
            value: raw.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_to_hybrid_every_ten_events() {
        let config = PersistenceConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config, PersistenceConfig::default());
        assert_eq!(
            config.strategy,
            StrategyKind::Hybrid(NonZeroU64::new(10).unwrap())
        );
    }

    #[test]
    fn test_bare_hybrid_uses_threshold_variable() {
        let config = PersistenceConfig::from_lookup(lookup_from(&[
            (CHRONICLE_SERIALIZATION_STRATEGY, "hybrid"),
            (CHRONICLE_EVENTS_PER_SNAPSHOT, "4"),
        ]))
        .unwrap();

        assert_eq!(config.strategy, StrategyKind::Hybrid(NonZeroU64::new(4).unwrap()));
    }

    #[test]
    fn test_inline_threshold_wins_over_variable() {
        let config = PersistenceConfig::from_lookup(lookup_from(&[
            (CHRONICLE_SERIALIZATION_STRATEGY, "hybrid:2"),
            (CHRONICLE_EVENTS_PER_SNAPSHOT, "4"),
        ]))
        .unwrap();

        assert_eq!(config.strategy, StrategyKind::Hybrid(NonZeroU64::new(2).unwrap()));
    }

    #[test]
    fn test_event_only_is_selected() {
        let config = PersistenceConfig::from_lookup(lookup_from(&[(
            CHRONICLE_SERIALIZATION_STRATEGY,
            "event-only",
        )]))
        .unwrap();

        assert_eq!(config.strategy, StrategyKind::EventOnly);
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let err = PersistenceConfig::from_lookup(lookup_from(&[(
            CHRONICLE_EVENTS_PER_SNAPSHOT,
            "0",
        )]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidNumber { .. }));
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        let err = PersistenceConfig::from_lookup(lookup_from(&[(
            CHRONICLE_SERIALIZATION_STRATEGY,
            "append-only",
        )]))
        .unwrap_err();

        assert_eq!(err, ConfigError::UnknownStrategy("append-only".to_owned()));
    }
}
