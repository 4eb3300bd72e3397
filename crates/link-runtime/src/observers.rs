//! # ObserverRegistry: non-blocking fan-out of link events
//!
//! Every subscriber gets its own bounded queue. `emit` never waits:
//!
//! - Per-subscriber FIFO, in the order the driver generated the events.
//! - A full queue drops the event for that subscriber only, with a warning.
//!   `Event::seq` lets a subscriber notice the gap.
//! - A subscriber whose stream was dropped is removed on the next emit.
//!
//! ```text
//!    emit(&Event)
//!        ├──► [queue S1] ──► Subscription S1
//!        ├──► [queue S2] ──► Subscription S2   (full: event dropped for S2)
//!        └──► [queue SN] ──► Subscription SN
//! ```

use crate::link_warn;
use futures::stream::Stream;
use futures::StreamExt;
use futures_channel::mpsc;
use link_protocol::Event;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

/// Identifies a subscription for `unsubscribe`
pub type SubscriptionId = u64;

struct Subscriber {
    id: SubscriptionId,
    tx: mpsc::Sender<Event>,
}

#[derive(Default)]
struct Inner {
    next_id: SubscriptionId,
    subscribers: Vec<Subscriber>,
}

/// Shared set of event subscribers.
///
/// Clones refer to the same set, so the handle can subscribe while the
/// driver emits.
#[derive(Clone)]
pub struct ObserverRegistry {
    inner: Arc<Mutex<Inner>>,
    capacity: usize,
}

impl ObserverRegistry {
    /// `capacity` is the number of undelivered events each subscriber may hold
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves the set itself consistent
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self) -> Subscription {
        // One slot is reserved per sender, so `capacity - 1` buffered plus
        // that slot gives exactly `capacity`
        let (tx, rx) = mpsc::channel(self.capacity - 1);
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.subscribers.push(Subscriber { id, tx });
        Subscription { id, rx }
    }

    /// Remove a subscription. Its stream ends once drained.
    ///
    /// Returns false if the id was unknown (already removed).
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|s| s.id != id);
        inner.subscribers.len() != before
    }

    /// Deliver one event to every subscriber without blocking
    pub fn emit(&self, event: &Event) {
        let mut inner = self.lock();
        inner.subscribers.retain_mut(|sub| match sub.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(e) if e.is_full() => {
                link_warn!(
                    "Observer {} dropped event #{}: queue full",
                    sub.id,
                    event.seq
                );
                true
            }
            Err(_) => false,
        });
    }

    /// Drop every subscriber, ending their streams
    pub fn clear(&self) {
        self.lock().subscribers.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("subscribers", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Stream of events for one observer
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::Receiver<Event>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Take the next buffered event without waiting
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Take every buffered event without waiting
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

impl Stream for Subscription {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.rx.poll_next_unpin(cx)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use link_protocol::EventKind;

    fn event(seq: u64) -> Event {
        Event::new(seq, EventKind::Connected)
    }

    #[test]
    fn test_every_subscriber_gets_every_event() {
        let registry = ObserverRegistry::new(16);
        let mut a = registry.subscribe();
        let mut b = registry.subscribe();
        assert_ne!(a.id(), b.id());

        for seq in 1..=3 {
            registry.emit(&event(seq));
        }

        let seqs = |sub: &mut Subscription| sub.drain().iter().map(|e| e.seq).collect::<Vec<_>>();
        assert_eq!(seqs(&mut a), vec![1, 2, 3]);
        assert_eq!(seqs(&mut b), vec![1, 2, 3]);
    }

    #[test]
    fn test_full_queue_drops_for_slow_subscriber_only() {
        let registry = ObserverRegistry::new(2);
        let mut slow = registry.subscribe();
        let mut fast = registry.subscribe();

        registry.emit(&event(1));
        assert_eq!(fast.try_recv().unwrap().seq, 1);
        registry.emit(&event(2));
        assert_eq!(fast.try_recv().unwrap().seq, 2);
        registry.emit(&event(3));
        assert_eq!(fast.try_recv().unwrap().seq, 3);

        // Capacity 2: the third event was dropped for the slow one
        let seqs: Vec<_> = slow.drain().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let registry = ObserverRegistry::new(4);
        let keep = registry.subscribe();
        let gone = registry.subscribe();
        drop(gone);

        registry.emit(&event(1));
        assert_eq!(registry.len(), 1);
        drop(keep);
    }

    #[test]
    fn test_unsubscribe() {
        let registry = ObserverRegistry::new(4);
        let mut sub = registry.subscribe();
        let id = sub.id();

        registry.emit(&event(1));
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.emit(&event(2));

        // Buffered event still readable, then the stream ends
        assert_eq!(sub.try_recv().unwrap().seq, 1);
        assert!(matches!(
            sub.rx.try_recv(),
            Err(mpsc::TryRecvError::Closed)
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_clear_ends_streams() {
        let registry = ObserverRegistry::new(4);
        let sub = registry.subscribe();
        registry.emit(&event(1));
        registry.clear();

        let events: Vec<_> = sub.collect().await;
        assert_eq!(events.len(), 1);
    }
}
