use link_protocol::WriteError;
use link_runtime::{link_debug, TimerKind, TimerSlot, TimerSpawner, TimerTicket, TransportLink};
use std::time::Duration;
use tokio::time::Instant;

/// Heartbeat prober for one session
///
/// Holds the probe tick and the response timeout, nothing else between
/// ticks. Each tick writes the payload once and arms the timeout; the
/// prober never retries a probe. Whatever happens after a missed probe is
/// the supervisor's decision.
///
/// ```text
///  start ──► [tick armed] ──tick──► write payload ──► [timeout armed]
///                 ▲                                        │
///                 └──────────────── ack ◄──────────────────┤
///                                                          └──timeout──► failed
/// ```
#[derive(Debug)]
pub struct HeartbeatProber {
    interval: Duration,
    response_timeout: Duration,
    payload: Vec<u8>,
    tick: TimerSlot,
    timeout: TimerSlot,
    sent_at: Option<Instant>,
}

impl HeartbeatProber {
    pub fn new(interval: Duration, payload: Vec<u8>, timeout_floor: Duration) -> Self {
        Self {
            interval,
            response_timeout: Self::response_timeout_for(interval, timeout_floor),
            payload,
            tick: TimerSlot::default(),
            timeout: TimerSlot::default(),
            sent_at: None,
        }
    }

    /// `max(interval / 2, floor)`
    pub fn response_timeout_for(interval: Duration, floor: Duration) -> Duration {
        (interval / 2).max(floor)
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Arm the next tick, replacing any outstanding probe
    pub fn start(&mut self, timers: &TimerSpawner, generation: u64) {
        self.timeout.disarm();
        self.sent_at = None;
        self.tick
            .arm(timers, TimerKind::ProbeTick, generation, self.interval);
    }

    /// Cancel both timers. Idempotent.
    pub fn stop(&mut self) {
        self.tick.disarm();
        self.timeout.disarm();
        self.sent_at = None;
    }

    /// Is either timer armed?
    pub fn is_armed(&self) -> bool {
        self.tick.is_armed() || self.timeout.is_armed()
    }

    /// Is a probe waiting for its response?
    pub fn is_outstanding(&self) -> bool {
        self.sent_at.is_some()
    }

    /// Accept a fired tick; false for stale tickets
    pub fn accept_tick(&mut self, ticket: &TimerTicket) -> bool {
        self.tick.fire(ticket)
    }

    /// Accept a fired response timeout; false for stale tickets
    pub fn accept_timeout(&mut self, ticket: &TimerTicket) -> bool {
        let accepted = self.timeout.fire(ticket);
        if accepted {
            self.sent_at = None;
        }
        accepted
    }

    /// Write one probe and arm its response timeout.
    ///
    /// Returns the payload written, for the `HeartbeatSent` event.
    pub fn send_probe(
        &mut self,
        link: &mut dyn TransportLink,
        timers: &TimerSpawner,
        generation: u64,
    ) -> Result<Vec<u8>, WriteError> {
        link.write(&self.payload)?;
        self.sent_at = Some(Instant::now());
        self.timeout.arm(
            timers,
            TimerKind::ProbeTimeout,
            generation,
            self.response_timeout,
        );
        link_debug!(
            "Probe sent ({} bytes), response due within {:?}",
            self.payload.len(),
            self.response_timeout
        );
        Ok(self.payload.clone())
    }

    /// The outstanding probe was answered: cancel the timeout and schedule
    /// the next tick. Returns the round-trip time, or `None` if no probe
    /// was outstanding.
    pub fn acknowledge(&mut self, timers: &TimerSpawner, generation: u64) -> Option<Duration> {
        let sent_at = self.sent_at.take()?;
        let rtt = sent_at.elapsed();
        self.timeout.disarm();
        self.tick
            .arm(timers, TimerKind::ProbeTick, generation, self.interval);
        Some(rtt)
    }
}
