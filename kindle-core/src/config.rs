//! Runtime Configuration
//!
//! A [`Runtime`](crate::reactive::Runtime) is created from a `RuntimeConfig`.
//! The defaults are fine for applications; tests lower the limits to make
//! runaway effects fail fast.
//!
//! ```rust,ignore
//! let config = RuntimeConfig::default()
//!     .max_microtask_rounds(64)
//!     .warn_on_self_trigger(false);
//! let rt = Runtime::with_config(config);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuntimeError};

/// Default bound on microtasks processed by one `drain_microtasks` call.
pub const DEFAULT_MAX_MICROTASK_ROUNDS: usize = 10_000;

/// Tunables for a reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on microtasks executed by a single drain.
    ///
    /// A render effect that writes to its own dependency schedules a fresh
    /// flush every generation. Without a bound the drain would never return.
    pub max_microtask_rounds: usize,

    /// Log a warning when an effect's write to one of its own dependencies is
    /// skipped during trigger.
    pub warn_on_self_trigger: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_microtask_rounds: DEFAULT_MAX_MICROTASK_ROUNDS,
            warn_on_self_trigger: true,
        }
    }
}

impl RuntimeConfig {
    /// Set the microtask bound.
    ///
    /// Values below 1 are clamped to 1 so that a drain can always make progress.
    pub fn max_microtask_rounds(mut self, rounds: usize) -> Self {
        self.max_microtask_rounds = rounds.max(1);
        self
    }

    /// Enable or disable the self-trigger warning.
    pub fn warn_on_self_trigger(mut self, enabled: bool) -> Self {
        self.warn_on_self_trigger = enabled;
        self
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(input: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(input).map_err(|e| RuntimeError::Config(e.to_string()))?;
        let rounds = config.max_microtask_rounds;
        Ok(config.max_microtask_rounds(rounds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_microtask_rounds, DEFAULT_MAX_MICROTASK_ROUNDS);
        assert!(config.warn_on_self_trigger);
    }

    #[test]
    fn builder_clamps_zero_rounds() {
        let config = RuntimeConfig::default().max_microtask_rounds(0);
        assert_eq!(config.max_microtask_rounds, 1);
    }

    #[test]
    fn from_json_fills_missing_fields() {
        let config = RuntimeConfig::from_json(r#"{ "max_microtask_rounds": 8 }"#).unwrap();
        assert_eq!(config.max_microtask_rounds, 8);
        assert!(config.warn_on_self_trigger);
    }

    #[test]
    fn from_json_rejects_garbage() {
        let err = RuntimeConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }
}
