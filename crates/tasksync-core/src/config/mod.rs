//! Sync tuning configuration.
//!
//! `SyncSettings` is parsed from JSON (every field optional) and may then be
//! overridden from `TASKSYNC_*` environment variables. Values are validated
//! before the engine sees them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

const ENV_PREFIX: &str = "TASKSYNC_";

/// Engine and scheduler tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    /// Attempts after the first failure before a pair is left in `error`
    pub max_retries: u32,
    pub backoff_multiplier: u32,
    pub operation_timeout_ms: u64,
    /// Upper bound for a single retry delay
    pub max_backoff_ms: u64,
    /// Retries are dropped once the queue holds this many entries
    pub queue_capacity: usize,
    pub default_sync_interval_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_multiplier: 2,
            operation_timeout_ms: 30_000,
            max_backoff_ms: 300_000,
            queue_capacity: 100,
            default_sync_interval_secs: 30,
        }
    }
}

impl SyncSettings {
    /// Parse settings from a JSON document and validate them
    pub fn from_json(payload: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(payload)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `TASKSYNC_*` overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup, e.g. a map in tests.
    ///
    /// Keys are the upper-cased field names with the `TASKSYNC_` prefix.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |field: &str| normalize_text_option(lookup(&format!("{ENV_PREFIX}{field}")));

        if let Some(value) = read("MAX_RETRIES") {
            self.max_retries = parse_number("MAX_RETRIES", &value)?;
        }
        if let Some(value) = read("BACKOFF_MULTIPLIER") {
            self.backoff_multiplier = parse_number("BACKOFF_MULTIPLIER", &value)?;
        }
        if let Some(value) = read("OPERATION_TIMEOUT_MS") {
            self.operation_timeout_ms = parse_number("OPERATION_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read("MAX_BACKOFF_MS") {
            self.max_backoff_ms = parse_number("MAX_BACKOFF_MS", &value)?;
        }
        if let Some(value) = read("QUEUE_CAPACITY") {
            self.queue_capacity = parse_number("QUEUE_CAPACITY", &value)?;
        }
        if let Some(value) = read("DEFAULT_SYNC_INTERVAL_SECS") {
            self.default_sync_interval_secs = parse_number("DEFAULT_SYNC_INTERVAL_SECS", &value)?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.backoff_multiplier == 0 {
            return Err(Error::InvalidInput(
                "backoff_multiplier must be at least 1".to_string(),
            ));
        }
        if self.operation_timeout_ms == 0 {
            return Err(Error::InvalidInput(
                "operation_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_backoff_ms == 0 {
            return Err(Error::InvalidInput(
                "max_backoff_ms must be greater than zero".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidInput(
                "queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.default_sync_interval_secs == 0 {
            return Err(Error::InvalidInput(
                "default_sync_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub const fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub const fn default_sync_interval(&self) -> Duration {
        Duration::from_secs(self.default_sync_interval_secs)
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T> {
    raw.parse().map_err(|_| {
        Error::InvalidInput(format!(
            "{ENV_PREFIX}{field} must be a non-negative integer, got '{raw}'"
        ))
    })
}
