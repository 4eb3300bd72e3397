//! # Native Transport
//!
//! OS serial ports (Linux, macOS, Windows) behind the `Transport` seam of
//! the link supervisor, via the `serialport` crate.
//!
//! - **SerialTransport**: opens a port with the requested framing and starts
//!   a reader thread that feeds inbound bytes, errors and hang-ups back to
//!   the supervisor
//! - **list_ports**: enumerate endpoints with their USB identity
//!
//! Discovery is kept apart from supervision: the supervisor only ever sees
//! an endpoint id string.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::todo
)]

pub mod ports;
pub mod serial;

pub use ports::list_ports;
pub use serial::SerialTransport;
