//! Cancellable one-shot timers for supervised operations
//!
//! A timer reports back through the supervisor queue as
//! `SupervisorMessage::TimerFired(ticket)`. The ticket carries the timer
//! kind, the session generation it was armed for and a unique sequence
//! number, so a firing that was already queued when its timer got cancelled
//! can be recognized and dropped.
use crate::channels::SupervisorMessage;
use crate::link_debug;
use futures_channel::mpsc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The timers a session may have outstanding, at most one of each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Bounds one `Transport::open`
    ConnectTimeout,
    /// Wait before the next reconnect attempt
    ReconnectDelay,
    /// Next heartbeat probe
    ProbeTick,
    /// Deadline for the outstanding probe's response
    ProbeTimeout,
}

/// Identity of one armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTicket {
    pub kind: TimerKind,
    pub generation: u64,
    pub seq: u64,
}

/// Handle to an armed timer
///
/// When dropped or explicitly cancelled, the timer task is aborted and will
/// not report, preventing spurious firings after the operation completed.
pub struct TimerHandle {
    ticket: TimerTicket,
    cancelled: Arc<AtomicBool>,
    task: tokio::task::JoinHandle<()>,
}

impl TimerHandle {
    pub fn ticket(&self) -> TimerTicket {
        self.ticket
    }

    /// Cancel the timer, preventing it from firing
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.task.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        // Auto-cancel when handle is dropped
        self.cancel();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("ticket", &self.ticket)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Arms timers that report into one supervisor queue.
///
/// Clones share the sequence counter, so tickets stay unique across every
/// component of a session.
#[derive(Clone)]
pub struct TimerSpawner {
    tx: mpsc::UnboundedSender<SupervisorMessage>,
    next_seq: Arc<AtomicU64>,
}

impl TimerSpawner {
    pub fn new(tx: mpsc::UnboundedSender<SupervisorMessage>) -> Self {
        Self {
            tx,
            next_seq: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Spawn a timer that reports `TimerFired` after `duration`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, kind: TimerKind, generation: u64, duration: Duration) -> TimerHandle {
        let ticket = TimerTicket {
            kind,
            generation,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancel_flag = cancelled.clone();
        let tx = self.tx.clone();
        // Measured from arming, not from the task's first poll
        let deadline = tokio::time::Instant::now() + duration;

        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;

            // Final check before reporting
            if cancel_flag.load(Ordering::Acquire) {
                return;
            }
            if tx
                .unbounded_send(SupervisorMessage::TimerFired(ticket))
                .is_err()
            {
                link_debug!("Timer {:?} fired after supervisor shut down", ticket.kind);
            }
        });

        TimerHandle {
            ticket,
            cancelled,
            task,
        }
    }
}

/// Holder for the single outstanding timer of one kind.
///
/// Arming replaces (and thereby cancels) whatever was armed before.
#[derive(Debug, Default)]
pub struct TimerSlot {
    handle: Option<TimerHandle>,
}

impl TimerSlot {
    pub fn arm(
        &mut self,
        spawner: &TimerSpawner,
        kind: TimerKind,
        generation: u64,
        duration: Duration,
    ) {
        self.handle = Some(spawner.spawn(kind, generation, duration));
    }

    /// Cancel the armed timer, if any. Safe to call repeatedly.
    pub fn disarm(&mut self) {
        self.handle = None;
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// Accept a fired ticket.
    ///
    /// Returns true and clears the slot only when the ticket belongs to the
    /// timer currently armed here; stale or foreign tickets return false.
    pub fn fire(&mut self, ticket: &TimerTicket) -> bool {
        match &self.handle {
            Some(handle) if handle.ticket() == *ticket => {
                self.handle = None;
                true
            }
            _ => false,
        }
    }
}
