//! Centralized tuning constants for the link supervisor
//!
//! These are the defaults behind `SupervisionConfig`. Timeouts and retry
//! values are picked for USB serial bridges and AT-style modems.
//!
//! **Before changing any constant:**
//! 1. Read its full documentation comment
//! 2. Check the scenarios in `tests/integration_test.rs` that depend on it
//! 3. Test on real hardware (a USB bridge you can unplug)

/// Opening a transport
pub mod connect {
    /// Upper bound for one `Transport::open` (milliseconds)
    ///
    /// **Value**: 10 000ms
    ///
    /// **Rationale**: Opening a port normally completes in well under a
    /// second. The slow cases are:
    /// - USB re-enumeration right after replug: 200-500ms
    /// - OS driver handshake after a device swap: 1-2s
    /// - Bluetooth SPP ports paging the remote device: 5-8s
    ///
    /// An open still pending after 10s is treated as a failed attempt.
    ///
    /// **Used in**: supervisor.rs, handle.rs (`test_connection`)
    pub const TIMEOUT_MS: u64 = 10_000;
}

/// Heartbeat probing
pub mod heartbeat {
    /// Lower bound for the probe response timeout (milliseconds)
    ///
    /// **Value**: 1 000ms
    ///
    /// **Rationale**: The response timeout is half the probe interval, but
    /// a very short interval would leave a device no time to answer:
    /// - AT command turnaround on a modem: 20-200ms
    /// - MCU firmware busy in a flash write: up to 500ms
    ///
    /// At 1s: no false failures on busy firmware, detection still fast.
    ///
    /// **Used in**: prober.rs
    pub const PROBE_TIMEOUT_FLOOR_MS: u64 = 1_000;
}

/// Reconnect backoff
pub mod reconnect {
    /// Growth factor between consecutive reconnect delays
    ///
    /// **Value**: 2.0 (doubling)
    ///
    /// **Used in**: backoff.rs
    pub const BACKOFF_FACTOR: f64 = 2.0;

    /// Cap for a single reconnect delay (milliseconds)
    ///
    /// **Value**: 60 000ms
    ///
    /// **Rationale**: With the 30s default heartbeat interval as the base,
    /// doubling reaches the cap on the second retry. Waiting longer than a
    /// minute between attempts makes a replugged device look dead to the user.
    ///
    /// **Used in**: backoff.rs
    pub const MAX_DELAY_MS: u64 = 60_000;

    /// Floor for the backoff base (milliseconds)
    ///
    /// **Value**: 100ms
    ///
    /// **Rationale**: The base is the heartbeat interval, which may be
    /// unset (zero) when heartbeat is disabled. USB controllers need
    /// ~50ms to release a port lock after close; 100ms keeps a reopen from
    /// hammering a port that is still being released.
    ///
    /// **Used in**: backoff.rs
    pub const MIN_DELAY_MS: u64 = 100;
}

/// Observer fan-out
pub mod observers {
    /// Events buffered per subscriber before new ones are dropped for it
    ///
    /// **Value**: 1024 events
    ///
    /// **Rationale**: Lifecycle events are rare; the volume comes from
    /// `DataReceived`. A UI that redraws every 200ms receiving small chunks
    /// at 115200 baud stays far below this.
    ///
    /// **Used in**: config.rs
    pub const QUEUE_CAPACITY: usize = 1024;
}
