//! Registry and sweeper configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const ENV_IDLE_TIMEOUT: &str = "DREAMJOB_IDLE_TIMEOUT_SECS";
const ENV_SWEEP_INTERVAL: &str = "DREAMJOB_SWEEP_INTERVAL_SECS";
const ENV_SUBSCRIBER_CAPACITY: &str = "DREAMJOB_SUBSCRIBER_CAPACITY";

/// Tunables for [`SessionRegistry`](crate::SessionRegistry) and
/// [`IdleSweeper`](crate::IdleSweeper).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Seconds without a touch after which a session is evicted.
    pub idle_timeout_secs: u64,
    /// Seconds between sweeper cycles.
    pub sweep_interval_secs: u64,
    /// Queue depth of each subscriber channel created by the registry.
    pub subscriber_capacity: usize,
    /// Buffer size of the registry event bus.
    pub event_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 30 * 60,
            sweep_interval_secs: 10 * 60,
            subscriber_capacity: 256,
            event_capacity: 1024,
        }
    }
}

impl RegistryConfig {
    /// Defaults overlaid with `DREAMJOB_*` environment variables.
    ///
    /// Unparseable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = parse_var(&lookup, ENV_IDLE_TIMEOUT) {
            self.idle_timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_SWEEP_INTERVAL) {
            self.sweep_interval_secs = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_SUBSCRIBER_CAPACITY) {
            self.subscriber_capacity = v;
        }
        self
    }

    /// Idle threshold, at least one second.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.max(1))
    }

    /// Sweep period, at least one second.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring invalid configuration value");
            None
        }
    }
}
