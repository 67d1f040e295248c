//! Configuration types for chatvault.
//!
//! `VaultConfig` represents the top-level `config.toml`. The encryption key is
//! deliberately absent: it is read from the environment, never from disk.

use serde::{Deserialize, Serialize};

use std::time::Duration;

/// Exponential backoff policy for transient store failures.
///
/// Read-only after construction and shared by every component of a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first (default 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait before the second attempt (default 100ms).
    #[serde(
        rename = "initial_delay_ms",
        with = "duration_ms",
        default = "default_initial_delay"
    )]
    pub initial_delay: Duration,

    /// Growth factor applied to the delay after each wait (default 2.0).
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound on any single wait (default 2s).
    #[serde(
        rename = "max_delay_ms",
        with = "duration_ms",
        default = "default_max_delay"
    )]
    pub max_delay: Duration,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> Duration {
    Duration::from_secs(2)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            multiplier: default_multiplier(),
            max_delay: default_max_delay(),
        }
    }
}

impl RetryConfig {
    /// Delay that follows `delay`: `min(delay * multiplier, max_delay)`.
    ///
    /// A non-finite or sub-unit multiplier leaves the delay unchanged.
    pub fn next_delay(&self, delay: Duration) -> Duration {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return delay.min(self.max_delay);
        }
        Duration::try_from_secs_f64(delay.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Top-level configuration. All fields have sensible defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// SQLite URL. Defaults to `sqlite://{data_dir}/chatvault.db`.
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default)]
    pub retry: RetryConfig,
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
