//! # Link Runtime
//!
//! Runtime infrastructure for the link supervisor.
//!
//! This crate defines:
//! - **Actor trait**: sequential message-driven driver with lifecycle hooks
//! - **Supervisor queue**: the single ordered message type every input is serialized into
//! - **Timers**: cancellable one-shot timers tagged with generation tickets
//! - **Transport seam**: the trait a byte-stream collaborator implements
//! - **Observer registry**: non-blocking fan-out of events to subscribers
//!
//! ## Architecture
//!
//! ```text
//!  LinkHandle ─┐
//!  timers ─────┼──► SupervisorMessage queue ──► driver (Actor::run) ──► ObserverRegistry
//!  transport ──┘        (unbounded, FIFO)                                    │
//!                                                                ┌───────────┼───────────┐
//!                                                                ▼           ▼           ▼
//!                                                          Subscription Subscription ...
//! ```
//!
//! - **Single writer**: only the driver mutates session state
//! - **Generation tickets**: late timer and transport notifications are recognized and dropped
//! - **Non-blocking fan-out**: a slow observer loses events, the driver never waits

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::todo
)]

pub mod actor;
pub mod channels;
pub mod logging;
pub mod observers;
pub mod timers;
pub mod transport;

#[doc(hidden)]
pub use log as __log;

pub use actor::Actor;
pub use channels::{supervisor_channel, SupervisorMessage, TransportNotice};
pub use observers::{ObserverRegistry, Subscription, SubscriptionId};
pub use timers::{TimerHandle, TimerKind, TimerSlot, TimerSpawner, TimerTicket};
pub use transport::{Transport, TransportEvents, TransportLink};
