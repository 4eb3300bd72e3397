//! # Link Protocol
//!
//! Type definitions shared by the link supervisor, its runtime and its
//! collaborators (transports, observers, front-ends).
//!
//! This crate has no runtime and performs no I/O, which keeps every type
//! here testable in plain `#[test]` functions.
//!
//! ## Contents
//!
//! - **LinkConfig**: endpoint and framing parameters plus heartbeat settings
//! - **LinkState**: the supervisor FSM states and the legal transition table
//! - **Event / EventKind**: timestamped lifecycle notifications for observers
//! - **Errors**: `ConfigError`, `OpenError`, `WriteError` and the umbrella `LinkError`
//! - **Persisted snapshot**: recovering the last-used link from saved preferences
//!
//! ## Flow
//!
//! ```text
//! front-end → LinkConfig → LinkHandle::configure/connect → supervisor
//!                                                            ↓
//!                                     Event { seq, timestamp_us, kind } → observers
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::todo
)]

pub mod config;
pub mod errors;
pub mod events;
pub mod persisted;
pub mod state;

pub use config::{HeartbeatPrefs, LineParams, LinkConfig, Parity, PortDescriptor};
pub use errors::{ConfigError, LinkError, OpenError, WriteError};
pub use events::{DisconnectReason, Event, EventKind};
pub use persisted::restore_last_link;
pub use state::{LinkState, LinkStatus};
