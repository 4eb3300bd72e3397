use crate::state::LinkState;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Why a link went down
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", content = "detail")]
pub enum DisconnectReason {
    /// `disconnect()` was called
    Explicit,
    /// The transport refused to open
    OpenFailed(String),
    /// The open did not complete within the connect timeout
    ConnectTimeout { timeout_ms: u64 },
    /// The transport reported an error while open
    TransportError(String),
    /// The transport closed without being asked to
    TransportClosed,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Explicit => write!(f, "disconnected by user"),
            Self::OpenFailed(msg) => write!(f, "failed to open port: {}", msg),
            Self::ConnectTimeout { timeout_ms } => {
                write!(f, "port did not open within {} ms", timeout_ms)
            }
            Self::TransportError(msg) => write!(f, "port error: {}", msg),
            Self::TransportClosed => write!(f, "port closed unexpectedly"),
        }
    }
}

/// What happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    /// Transport open, link usable
    Connected,
    /// Link went down
    Disconnected { reason: DisconnectReason },
    /// A probe payload was written
    HeartbeatSent { payload: Vec<u8> },
    /// The outstanding probe was answered
    HeartbeatOk { rtt_ms: u64 },
    /// A probe went unanswered or the link failed while probing
    HeartbeatFailed { reason: String },
    /// Reconnect attempt `attempt` failed. `delay_ms` is the backoff the
    /// policy gives for the next attempt, if the budget allows one.
    ReconnectAttempt { attempt: u32, delay_ms: u64 },
    /// An automatic reopen succeeded
    ReconnectSucceeded,
    /// Retry budget spent; a manual connect is required
    ReconnectExhausted { attempts: u32 },
    /// Supervisor state changed
    StateChanged { from: LinkState, to: LinkState },
    /// Bytes arrived on the open link
    DataReceived { bytes: Vec<u8> },
    /// Bytes from `send` were written
    DataSent { bytes: Vec<u8> },
}

impl EventKind {
    /// True for the link lifecycle notifications (everything except
    /// state-change and data traffic echoes)
    pub fn is_lifecycle(&self) -> bool {
        !matches!(
            self,
            Self::StateChanged { .. } | Self::DataReceived { .. } | Self::DataSent { .. }
        )
    }

    /// One-line description for UI logs
    pub fn describe(&self) -> String {
        match self {
            Self::Connected => "Connected".to_string(),
            Self::Disconnected { reason } => format!("Disconnected: {}", reason),
            Self::HeartbeatSent { payload } => {
                format!("Heartbeat sent: {}", String::from_utf8_lossy(payload))
            }
            Self::HeartbeatOk { rtt_ms } => format!("Heartbeat OK ({} ms)", rtt_ms),
            Self::HeartbeatFailed { reason } => format!("Heartbeat failed: {}", reason),
            Self::ReconnectAttempt { attempt, delay_ms } => format!(
                "Reconnect attempt {} failed (backoff {} ms)",
                attempt, delay_ms
            ),
            Self::ReconnectSucceeded => "Reconnected".to_string(),
            Self::ReconnectExhausted { attempts } => format!(
                "Gave up after {} reconnect attempts. Check the device connection.",
                attempts
            ),
            Self::StateChanged { from, to } => format!("State: {} → {}", from, to),
            Self::DataReceived { bytes } => format!("RX {} bytes", bytes.len()),
            Self::DataSent { bytes } => format!("TX {} bytes", bytes.len()),
        }
    }
}

/// Timestamped, sequence-numbered notification delivered to observers.
///
/// `seq` increases by one per event within a session, so observers can
/// detect events dropped from their buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub seq: u64,
    /// Microseconds since the Unix epoch
    pub timestamp_us: u64,
    pub kind: EventKind,
}

impl Event {
    pub fn new(seq: u64, kind: EventKind) -> Self {
        let timestamp_us = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Self {
            seq,
            timestamp_us,
            kind,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_timestamped() {
        let event = Event::new(7, EventKind::Connected);
        assert_eq!(event.seq, 7);
        assert!(event.timestamp_us > 0);
    }

    #[test]
    fn test_lifecycle_filter() {
        assert!(EventKind::ReconnectSucceeded.is_lifecycle());
        assert!(EventKind::HeartbeatOk { rtt_ms: 3 }.is_lifecycle());
        assert!(!EventKind::StateChanged {
            from: LinkState::Connecting,
            to: LinkState::Connected
        }
        .is_lifecycle());
        assert!(!EventKind::DataReceived { bytes: vec![1] }.is_lifecycle());
    }

    #[test]
    fn test_reason_is_human_readable() {
        let reason = DisconnectReason::ConnectTimeout { timeout_ms: 10_000 };
        assert_eq!(reason.to_string(), "port did not open within 10000 ms");

        let kind = EventKind::Disconnected {
            reason: DisconnectReason::TransportClosed,
        };
        assert_eq!(kind.describe(), "Disconnected: port closed unexpectedly");
    }

    #[test]
    fn test_reconnect_attempt_does_not_promise_a_retry() {
        // The last attempt is followed by ReconnectExhausted, not a retry
        let kind = EventKind::ReconnectAttempt {
            attempt: 3,
            delay_ms: 16000,
        };
        assert_eq!(kind.describe(), "Reconnect attempt 3 failed (backoff 16000 ms)");
        assert!(!kind.describe().contains("retrying"));
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::new(
            1,
            EventKind::ReconnectAttempt {
                attempt: 2,
                delay_ms: 4000,
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"]["type"], "ReconnectAttempt");
        assert_eq!(json["kind"]["attempt"], 2);

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
