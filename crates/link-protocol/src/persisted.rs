//! Recovering the last-used link from a saved preferences snapshot.
//!
//! The snapshot is whatever the front-end persisted, in this shape:
//!
//! ```json
//! {
//!   "state": {
//!     "selectedDevice": { "path": "/dev/ttyUSB0" },
//!     "connectionOptions": { "baudRate": 115200, "dataBits": 8, "stopBits": 1, "parity": "none" }
//!   }
//! }
//! ```
//!
//! Reading storage is someone else's job; this module only turns the text
//! into a validated `LinkConfig` so the auto-reconnect path can be tested
//! without any storage backend.

use crate::config::{HeartbeatPrefs, LinkConfig, Parity};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Snapshot {
    state: Option<SnapshotState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotState {
    selected_device: Option<SelectedDevice>,
    connection_options: Option<ConnectionOptions>,
}

#[derive(Debug, Deserialize)]
struct SelectedDevice {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionOptions {
    baud_rate: Option<u32>,
    data_bits: Option<u8>,
    stop_bits: Option<u8>,
    parity: Option<Parity>,
}

/// Rebuild the last-used `LinkConfig` from a snapshot.
///
/// Missing connection options fall back to `LinkConfig::default()` values.
/// Returns `None` when the snapshot is malformed, names no device, or
/// describes a configuration that would fail validation.
pub fn restore_last_link(snapshot: &str, heartbeat: Option<&HeartbeatPrefs>) -> Option<LinkConfig> {
    let snapshot: Snapshot = serde_json::from_str(snapshot).ok()?;
    let state = snapshot.state?;
    let path = state.selected_device?.path?;

    let mut config = LinkConfig {
        endpoint_id: path,
        ..LinkConfig::default()
    };

    if let Some(options) = state.connection_options {
        if let Some(baud) = options.baud_rate {
            config.baud_rate = baud;
        }
        if let Some(bits) = options.data_bits {
            config.data_bits = bits;
        }
        if let Some(bits) = options.stop_bits {
            config.stop_bits = bits;
        }
        if let Some(parity) = options.parity {
            config.parity = parity;
        }
    }

    if let Some(prefs) = heartbeat {
        prefs.apply(&mut config);
    }

    config.validate().ok()?;
    Some(config)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_full_snapshot() {
        let snapshot = r#"{
            "state": {
                "selectedDevice": { "path": "COM4", "manufacturer": "FTDI" },
                "connectionOptions": { "baudRate": 115200, "dataBits": 7, "stopBits": 2, "parity": "even" },
                "isConnected": false
            }
        }"#;

        let config = restore_last_link(snapshot, None).unwrap();
        assert_eq!(config.endpoint_id, "COM4");
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.data_bits, 7);
        assert_eq!(config.stop_bits, 2);
        assert_eq!(config.parity, Parity::Even);
        assert!(!config.heartbeat_enabled);
    }

    #[test]
    fn test_restore_without_options_uses_defaults() {
        let snapshot = r#"{"state":{"selectedDevice":{"path":"/dev/ttyACM0"}}}"#;
        let config = restore_last_link(snapshot, None).unwrap();
        assert_eq!(config.endpoint_id, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.line_params().describe(), "9600 8N1");
    }

    #[test]
    fn test_restore_applies_heartbeat_prefs() {
        let snapshot = r#"{"state":{"selectedDevice":{"path":"/dev/ttyACM0"}}}"#;
        let prefs = HeartbeatPrefs {
            enabled: true,
            interval_ms: 10_000,
            message: "AT".into(),
            max_reconnect_attempts: 4,
        };
        let config = restore_last_link(snapshot, Some(&prefs)).unwrap();
        assert!(config.heartbeat_enabled);
        assert_eq!(config.heartbeat_interval_ms, 10_000);
        assert_eq!(config.max_reconnect_attempts, 4);
    }

    #[test]
    fn test_restore_rejects_missing_device() {
        assert!(restore_last_link(r#"{"state":{}}"#, None).is_none());
        assert!(restore_last_link(r#"{"state":{"selectedDevice":{}}}"#, None).is_none());
        assert!(restore_last_link(r#"{}"#, None).is_none());
    }

    #[test]
    fn test_restore_rejects_garbage() {
        assert!(restore_last_link("not json", None).is_none());
        assert!(restore_last_link("", None).is_none());
    }

    #[test]
    fn test_restore_rejects_invalid_config() {
        let snapshot = r#"{"state":{"selectedDevice":{"path":"COM1"},"connectionOptions":{"baudRate":0}}}"#;
        assert!(restore_last_link(snapshot, None).is_none());
    }
}
