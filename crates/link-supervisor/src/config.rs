use crate::constants;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout and retry tuning for supervised links
///
/// Separate from `LinkConfig`: these are properties of the supervisor, not
/// of the device being talked to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SupervisionConfig {
    /// Timeout for one transport open
    pub connect_timeout_ms: u64,
    /// Floor for the probe response timeout
    pub probe_timeout_floor_ms: u64,
    /// Multiplicative growth between reconnect delays
    pub backoff_factor: f64,
    /// Cap for a single reconnect delay
    pub backoff_max_ms: u64,
    /// Events buffered per observer
    pub observer_queue_capacity: usize,
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: constants::connect::TIMEOUT_MS,
            probe_timeout_floor_ms: constants::heartbeat::PROBE_TIMEOUT_FLOOR_MS,
            backoff_factor: constants::reconnect::BACKOFF_FACTOR,
            backoff_max_ms: constants::reconnect::MAX_DELAY_MS,
            observer_queue_capacity: constants::observers::QUEUE_CAPACITY,
        }
    }
}

impl SupervisionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn probe_timeout_floor(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_floor_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SupervisionConfig::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.probe_timeout_floor(), Duration::from_secs(1));
        assert_eq!(config.backoff_factor, 2.0);
        assert_eq!(config.backoff_max(), Duration::from_secs(60));
        assert_eq!(config.observer_queue_capacity, 1024);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: SupervisionConfig =
            serde_json::from_str(r#"{"connectTimeoutMs": 2500}"#).unwrap();
        assert_eq!(config.connect_timeout_ms, 2500);
        assert_eq!(config.backoff_max_ms, constants::reconnect::MAX_DELAY_MS);
    }
}
