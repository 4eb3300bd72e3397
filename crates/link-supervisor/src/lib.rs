//! # Link Supervisor
//!
//! Keeps one logical serial link alive and reports everything that happens
//! to it as a typed event stream.
//!
//! - **LinkSupervisor**: the driver; owns the state machine and the session
//! - **HeartbeatProber**: periodic probe with a response timeout
//! - **ReconnectPolicy**: bounded, capped exponential backoff
//! - **LinkHandle**: the caller-facing API over the driver's queue
//!
//! ## Example
//!
//! ```rust,ignore
//! let handle = LinkHandle::spawn(Arc::new(SerialTransport::new()), SupervisionConfig::default());
//! let mut events = handle.subscribe();
//!
//! handle
//!     .connect_with(LinkConfig::new_8n1("/dev/ttyUSB0", 115200).with_heartbeat(5_000, "AT\r"))
//!     .await?;
//!
//! while let Some(event) = events.next().await {
//!     println!("{}", event.kind.describe());
//! }
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::todo
)]

pub mod backoff;
pub mod config;
pub mod constants;
pub mod handle;
pub mod prober;
pub mod supervisor;

pub use backoff::ReconnectPolicy;
pub use config::SupervisionConfig;
pub use handle::{test_connection, LinkHandle};
pub use prober::HeartbeatProber;
pub use supervisor::LinkSupervisor;
