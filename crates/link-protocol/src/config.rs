use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Highest baud rate accepted by `LinkConfig::validate`
pub const MAX_BAUD_RATE: u32 = 4_000_000;

/// Parity bit mode for a serial line
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl std::fmt::Display for Parity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = match self {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        };
        write!(f, "{}", c)
    }
}

/// Framing subset of a `LinkConfig` handed to the transport on every open
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LineParams {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
}

impl LineParams {
    /// Short framing notation, e.g. `9600 8N1`
    pub fn describe(&self) -> String {
        format!(
            "{} {}{}{}",
            self.baud_rate, self.data_bits, self.parity, self.stop_bits
        )
    }
}

/// Everything the supervisor needs to open and watch one link.
///
/// A config is frozen once a connection attempt starts. Reconnects reuse the
/// active config; a changed config only takes effect on the next explicit
/// `connect`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkConfig {
    pub endpoint_id: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
    pub heartbeat_enabled: bool,
    pub heartbeat_interval_ms: u64,
    pub heartbeat_payload: Vec<u8>,
    pub max_reconnect_attempts: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            endpoint_id: default_endpoint().to_string(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            heartbeat_enabled: false,
            heartbeat_interval_ms: 30_000,
            heartbeat_payload: b"AT".to_vec(),
            max_reconnect_attempts: 10,
        }
    }
}

fn default_endpoint() -> &'static str {
    if cfg!(windows) {
        "COM1"
    } else {
        "/dev/ttyUSB0"
    }
}

impl LinkConfig {
    /// Standard 8N1 configuration for an endpoint, heartbeat off
    pub fn new_8n1(endpoint_id: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            baud_rate,
            ..Self::default()
        }
    }

    /// Enable the heartbeat probe with the given interval and payload
    pub fn with_heartbeat(mut self, interval_ms: u64, payload: impl Into<Vec<u8>>) -> Self {
        self.heartbeat_enabled = true;
        self.heartbeat_interval_ms = interval_ms;
        self.heartbeat_payload = payload.into();
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn line_params(&self) -> LineParams {
        LineParams {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            parity: self.parity,
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Reject configurations the transport could never open.
    ///
    /// Runs synchronously inside `configure`; an invalid config never
    /// reaches the state machine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint_id.trim().is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        if self.baud_rate == 0 || self.baud_rate > MAX_BAUD_RATE {
            return Err(ConfigError::InvalidBaudRate(self.baud_rate));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(ConfigError::InvalidDataBits(self.data_bits));
        }
        if self.stop_bits != 1 && self.stop_bits != 2 {
            return Err(ConfigError::InvalidStopBits(self.stop_bits));
        }
        // 5-bit UARTs use 1.5 stop bits where 2 are requested
        if self.data_bits == 5 && self.stop_bits == 2 {
            return Err(ConfigError::UnsupportedFraming(self.line_params().describe()));
        }
        if self.heartbeat_enabled {
            if self.heartbeat_interval_ms == 0 {
                return Err(ConfigError::InvalidHeartbeat(
                    "interval must be greater than zero".into(),
                ));
            }
            if self.heartbeat_payload.is_empty() {
                return Err(ConfigError::InvalidHeartbeat("payload is empty".into()));
            }
        }
        Ok(())
    }
}

/// Heartbeat settings as entered by a user, kept apart from the line settings
/// because front-ends store them in a separate form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct HeartbeatPrefs {
    pub enabled: bool,
    pub interval_ms: u64,
    pub message: String,
    pub max_reconnect_attempts: u32,
}

impl Default for HeartbeatPrefs {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 30_000,
            message: "AT".into(),
            max_reconnect_attempts: 10,
        }
    }
}

impl HeartbeatPrefs {
    pub fn apply(&self, config: &mut LinkConfig) {
        config.heartbeat_enabled = self.enabled;
        config.heartbeat_interval_ms = self.interval_ms;
        config.heartbeat_payload = self.message.as_bytes().to_vec();
        config.max_reconnect_attempts = self.max_reconnect_attempts;
    }
}

/// One physical endpoint reported by port discovery
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortDescriptor {
    pub path: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl PortDescriptor {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            vid: None,
            pid: None,
            serial_number: None,
            manufacturer: None,
            product: None,
        }
    }
}
