//! Error taxonomy for the link supervisor
//!
//! Messages follow one format:
//!
//! 1. **What failed**: the operation
//! 2. **Why it failed**: the root cause if known
//! 3. **What to do**: a suggested action when there is one
//!
//! Examples:
//! - ✅ "Failed to open /dev/ttyUSB0: device busy. Close other programs using the port and retry."
//! - ❌ "open failed" (no endpoint, no cause)
//!
//! Propagation rules:
//! - `ConfigError` is returned synchronously by `configure` and never reaches the state machine.
//! - `OpenError` fails the current attempt only; the supervisor decides whether to retry.
//! - `WriteError` goes back to the caller of `send` and does not change link state.

use thiserror::Error;

/// Rejected link configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Endpoint identifier is empty. Select a serial port before connecting.")]
    EmptyEndpoint,

    #[error("Invalid baud rate {0}. Use a rate between 1 and 4000000.")]
    InvalidBaudRate(u32),

    #[error("Invalid data bits {0}. Use 5, 6, 7 or 8.")]
    InvalidDataBits(u8),

    #[error("Invalid stop bits {0}. Use 1 or 2.")]
    InvalidStopBits(u8),

    #[error("Unsupported framing {0}")]
    UnsupportedFraming(String),

    #[error("Invalid heartbeat settings: {0}")]
    InvalidHeartbeat(String),
}

/// Failure to open a transport for one connect attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpenError {
    #[error("Endpoint not found: {0}")]
    NotFound(String),

    #[error("Endpoint busy: {0}. Close other programs using the port and retry.")]
    Busy(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Open timed out after {0} ms")]
    Timeout(u64),

    #[error("Open failed: {0}")]
    Other(String),
}

/// Failure to write to an open transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("Not connected. Connect to a port before sending data.")]
    NotConnected,

    #[error("Write failed: {0}")]
    Io(String),
}

/// Unified error type for the supervisor API
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Write(#[from] WriteError),

    /// `connect` was called before any configuration was supplied
    #[error("No link configured. Call configure() before connect().")]
    NotConfigured,

    /// The supervisor task is gone
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Unexpected message in state {state}: {message}")]
    UnexpectedMessage { state: String, message: String },
}
