//! # Reconnect policy
//!
//! Capped exponential backoff seeded by the heartbeat interval and bounded
//! by `max_reconnect_attempts`:
//!
//! - `next_delay(n) = base × factor^n`, clamped to `max_delay`
//! - `should_stop(n)` is true once `n >= max_attempts`
//!
//! The delay for attempt `n` is derived from `n` alone, never from the
//! previous delay, so the policy holds no state and can be checked
//! exhaustively without timers.
//!
//! ```rust
//! use std::time::Duration;
//! use link_supervisor::ReconnectPolicy;
//!
//! let policy = ReconnectPolicy {
//!     base: Duration::from_secs(1),
//!     factor: 2.0,
//!     max_delay: Duration::from_secs(5),
//!     max_attempts: 3,
//! };
//!
//! assert_eq!(policy.next_delay(0), Duration::from_secs(1));
//! assert_eq!(policy.next_delay(2), Duration::from_secs(4));
//! assert_eq!(policy.next_delay(3), Duration::from_secs(5)); // capped
//! assert!(!policy.should_stop(2));
//! assert!(policy.should_stop(3));
//! ```

use crate::config::SupervisionConfig;
use crate::constants;
use link_protocol::LinkConfig;
use std::time::Duration;

/// Reconnect backoff parameters for one session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt
    pub base: Duration,
    /// Multiplicative growth factor (values below 1.0 are treated as 1.0)
    pub factor: f64,
    /// Cap for a single delay
    pub max_delay: Duration,
    /// Failed attempts allowed before giving up
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Build the policy for a session: the base is the heartbeat interval
    /// (floored at `MIN_DELAY_MS`), the rest comes from supervisor tuning.
    pub fn for_link(config: &LinkConfig, supervision: &SupervisionConfig) -> Self {
        let floor = Duration::from_millis(constants::reconnect::MIN_DELAY_MS);
        Self {
            base: config.heartbeat_interval().max(floor),
            factor: supervision.backoff_factor,
            max_delay: supervision.backoff_max(),
            max_attempts: config.max_reconnect_attempts,
        }
    }

    /// Delay to wait before the reconnect attempt that follows `attempt`
    /// failures. Non-decreasing in `attempt`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let factor = if self.factor.is_finite() {
            self.factor.max(1.0)
        } else {
            1.0
        };
        let exp = attempt.min(i32::MAX as u32) as i32;
        let unclamped = self.base.as_secs_f64() * factor.powi(exp);

        if !unclamped.is_finite() || unclamped >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(unclamped)
        }
    }

    /// Has the retry budget been spent after `attempt` failures?
    pub fn should_stop(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy(base_ms: u64, max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            base: Duration::from_millis(base_ms),
            factor: 2.0,
            max_delay: Duration::from_secs(60),
            max_attempts,
        }
    }

    #[test]
    fn test_backoff_calculation() {
        let policy = policy(1000, 10);
        assert_eq!(policy.next_delay(0), Duration::from_millis(1000));
        assert_eq!(policy.next_delay(1), Duration::from_millis(2000));
        assert_eq!(policy.next_delay(2), Duration::from_millis(4000));
        assert_eq!(policy.next_delay(5), Duration::from_millis(32000));
        assert_eq!(policy.next_delay(6), Duration::from_secs(60));
    }

    #[test]
    fn test_safety_overflow() {
        let policy = policy(1000, 10);
        assert_eq!(policy.next_delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_factor_below_one_is_constant() {
        let mut policy = policy(500, 3);
        policy.factor = 0.5;
        assert_eq!(policy.next_delay(0), policy.next_delay(4));

        policy.factor = f64::NAN;
        assert_eq!(policy.next_delay(3), Duration::from_millis(500));
    }

    #[test]
    fn test_for_link_seeds_from_heartbeat() {
        let config = LinkConfig::new_8n1("/dev/ttyUSB0", 9600)
            .with_heartbeat(1000, b"AT".to_vec())
            .with_max_reconnect_attempts(3);
        let policy = ReconnectPolicy::for_link(&config, &SupervisionConfig::default());
        assert_eq!(policy.base, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 3);

        // Heartbeat off with no interval still waits between attempts
        let mut config = LinkConfig::new_8n1("/dev/ttyUSB0", 9600);
        config.heartbeat_interval_ms = 0;
        let policy = ReconnectPolicy::for_link(&config, &SupervisionConfig::default());
        assert_eq!(policy.base, Duration::from_millis(100));
    }

    #[test]
    fn test_zero_attempts_stops_immediately() {
        assert!(policy(1000, 0).should_stop(0));
    }

    proptest! {
        #[test]
        fn prop_delay_monotonic_and_stop_exact(
            base_ms in 0u64..120_000,
            factor in 0.5f64..4.0,
            max_ms in 1u64..300_000,
            max_attempts in 0u32..32,
        ) {
            let policy = ReconnectPolicy {
                base: Duration::from_millis(base_ms),
                factor,
                max_delay: Duration::from_millis(max_ms),
                max_attempts,
            };

            let mut previous = Duration::ZERO;
            for attempt in 0..=max_attempts + 2 {
                let delay = policy.next_delay(attempt);
                prop_assert!(delay >= previous, "attempt {}: {:?} < {:?}", attempt, delay, previous);
                prop_assert!(delay <= policy.max_delay);
                prop_assert_eq!(policy.should_stop(attempt), attempt >= max_attempts);
                previous = delay;
            }
        }
    }
}
