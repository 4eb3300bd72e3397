use serde::{Deserialize, Serialize};

/// # Link State Machine
///
/// Exactly one state is active per supervisor session.
///
/// ## State Transition Diagram
///
/// ```text
///                 ┌──────────────────┐  connect()   ┌──────────────┐
///        ┌───────►│   Disconnected   │─────────────►│  Connecting  │
///        │        └──────────────────┘              └──┬───────┬───┘
///        │                 ▲  open failed,                │       │ open failed,
///        │ disconnect()    │  no heartbeat                │       │ heartbeat on
///        │ (any state)     └──────────────────────────────┤       │
///        │                                      opened    │       ▼
///        │        ┌──────────────┐  tick   ┌──────────────▼┐  ┌─────────────────┐
///        │        │   Probing    │◄────────┤   Connected   │  │  Reconnecting   │◄──┐
///        │        │              ├────────►│               │◄─┤ (policy delay,  │   │ open failed,
///        │        └──────┬───────┘   ack   └───────┬───────┘  │  then open)     ├───┘ attempts left
///        │     probe     │                         │ error /  └───────┬─────────┘
///        │     timeout   │      error / closed     │ closed       ▲   │ attempts
///        │               ▼                         ▼              │   │ exhausted
///        │        ┌─────────────────────────────────────┐         │   ▼
///        │        │              Degraded               ├─────────┘ ┌──────────────────────┐
///        │        └─────────────────┬───────────────────┘           │  ReconnectExhausted  │
///        │                          └──────────────────────────────►│  (terminal until     │
///        │                            no attempts allowed           │   explicit connect)  │
///        │                                                          └──────────────────────┘
/// ```
///
/// ## State Invariants
///
/// - **Disconnected**: no transport open, no timers armed
/// - **Connecting**: one open in flight, connect-timeout armed
/// - **Connected**: transport open; probe tick armed iff heartbeat is enabled
/// - **Probing**: transport open, one probe written, probe-timeout armed
/// - **Degraded**: failure detected, transport closed, reconnect decision pending
/// - **Reconnecting**: transport closed or opening; reconnect delay or connect-timeout armed
/// - **ReconnectExhausted**: transport closed, no timers; only an explicit `connect` leaves it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkState {
    /// No session activity
    Disconnected,

    /// Initial open in progress
    Connecting,

    /// Link open and healthy
    Connected,

    /// Heartbeat written, waiting for any response
    Probing,

    /// Failure detected, about to decide between reconnect and give-up
    Degraded,

    /// Automatic reopen sequence in progress
    Reconnecting,

    /// Retry budget spent; waiting for the user
    ReconnectExhausted,
}

impl LinkState {
    /// Is a transport currently open?
    pub fn is_link_open(&self) -> bool {
        matches!(self, Self::Connected | Self::Probing)
    }

    /// May a probe timer be armed in this state?
    pub fn allows_heartbeat(&self) -> bool {
        matches!(self, Self::Connected | Self::Probing | Self::Degraded)
    }

    /// Would an explicit `connect` start a new attempt from here?
    pub fn accepts_connect(&self) -> bool {
        matches!(self, Self::Disconnected | Self::ReconnectExhausted)
    }

    /// Is an open already being attempted?
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }

    /// User-facing status text
    pub fn status_text(&self) -> &'static str {
        match self {
            Self::Disconnected => "Ready to connect",
            Self::Connecting => "Connecting...",
            Self::Connected => "Connected",
            Self::Probing => "Connected (checking link...)",
            Self::Degraded => "Link failure detected",
            Self::Reconnecting => "Link lost. Reconnecting...",
            Self::ReconnectExhausted => "Reconnect failed. Check the device and reconnect.",
        }
    }

    /// Validate if transition to new_state is allowed from current state
    pub fn can_transition_to(&self, new_state: LinkState) -> bool {
        use LinkState::*;

        match (self, new_state) {
            // Explicit disconnect is legal from anywhere
            (_, Disconnected) => true,

            // From Disconnected
            (Disconnected, Connecting) => true,

            // From Connecting
            (Connecting, Connected) => true, // Transport opened
            (Connecting, Reconnecting) => true, // Open failed, heartbeat on

            // From Connected
            (Connected, Probing) => true,  // Probe tick
            (Connected, Degraded) => true, // Unsolicited error/close

            // From Probing
            (Probing, Connected) => true, // Ack in time
            (Probing, Degraded) => true,  // Timeout or error/close

            // From Degraded
            (Degraded, Reconnecting) => true,
            (Degraded, ReconnectExhausted) => true,

            // From Reconnecting
            (Reconnecting, Connected) => true,
            (Reconnecting, ReconnectExhausted) => true,

            // From ReconnectExhausted
            (ReconnectExhausted, Connecting) => true, // Explicit connect

            // All other transitions are invalid
            _ => false,
        }
    }
}

/// Point-in-time view of a supervisor session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStatus {
    pub state: LinkState,
    /// Endpoint of the active session, if any
    pub endpoint: Option<String>,
    /// Failed reconnect attempts since the last successful open
    pub attempts: u32,
    /// Current generation token
    pub generation: u64,
    /// Wall-clock time of the last answered probe (microseconds since the Unix epoch)
    pub last_heartbeat_ok_us: Option<u64>,
}

impl LinkStatus {
    /// Status of a supervisor that has never connected
    pub fn idle() -> Self {
        Self {
            state: LinkState::Disconnected,
            endpoint: None,
            attempts: 0,
            generation: 0,
            last_heartbeat_ok_us: None,
        }
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
