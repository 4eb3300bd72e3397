//! Transport seam
//!
//! The supervisor never touches an OS port directly. It asks a `Transport`
//! to open an endpoint and gets back an exclusively owned `TransportLink`.
//! Inbound data, errors and unsolicited closes are pushed through the
//! `TransportEvents` sink handed to `open`, tagged with the generation of
//! the attempt that opened the link.

use crate::channels::{SupervisorMessage, TransportNotice};
use crate::link_debug;
use async_trait::async_trait;
use futures_channel::mpsc;
use link_protocol::{LineParams, OpenError, WriteError};

/// Byte-stream collaborator able to open a named endpoint.
///
/// `open` may suspend. It must not retry internally: a failure ends the
/// current attempt and the supervisor decides what happens next.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(
        &self,
        endpoint: &str,
        params: &LineParams,
        events: TransportEvents,
    ) -> Result<Box<dyn TransportLink>, OpenError>;
}

/// One open link, owned by exactly one session.
///
/// Implementations should also release the endpoint on drop.
pub trait TransportLink: Send {
    fn write(&mut self, bytes: &[u8]) -> Result<(), WriteError>;

    /// Close the link. Called at most once by the supervisor; must not
    /// report `closed()` back for a close the supervisor asked for.
    fn close(&mut self);
}

/// Notification sink handed to `Transport::open`.
///
/// Cheap to clone; every clone reports for the same generation. Each
/// occurrence should be delivered once. Delivery after the supervisor is
/// gone is silently ignored.
#[derive(Clone)]
pub struct TransportEvents {
    tx: mpsc::UnboundedSender<SupervisorMessage>,
    generation: u64,
}

impl TransportEvents {
    pub fn new(tx: mpsc::UnboundedSender<SupervisorMessage>, generation: u64) -> Self {
        Self { tx, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Bytes arrived on the link
    pub fn data(&self, bytes: Vec<u8>) {
        self.notify(TransportNotice::Data(bytes));
    }

    /// The link failed
    pub fn error(&self, reason: impl Into<String>) {
        self.notify(TransportNotice::Error(reason.into()));
    }

    /// The link closed without being asked to
    pub fn closed(&self) {
        self.notify(TransportNotice::Closed);
    }

    /// Is anyone still listening?
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn notify(&self, notice: TransportNotice) {
        let msg = SupervisorMessage::Transport {
            generation: self.generation,
            notice,
        };
        if self.tx.unbounded_send(msg).is_err() {
            link_debug!(
                "Transport notice for generation {} dropped: supervisor gone",
                self.generation
            );
        }
    }
}

impl std::fmt::Debug for TransportEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportEvents")
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::channels::supervisor_channel;
    use futures::stream::StreamExt;

    #[tokio::test]
    async fn test_notices_are_generation_tagged() {
        let (tx, mut rx) = supervisor_channel();
        let events = TransportEvents::new(tx, 7);

        events.data(b"OK\r\n".to_vec());
        events.clone().error("framing error");
        events.closed();

        let mut notices = Vec::new();
        for _ in 0..3 {
            match rx.next().await.unwrap() {
                SupervisorMessage::Transport { generation, notice } => {
                    assert_eq!(generation, 7);
                    notices.push(notice);
                }
                other => panic!("Expected Transport, got {:?}", other),
            }
        }
        assert_eq!(
            notices,
            vec![
                TransportNotice::Data(b"OK\r\n".to_vec()),
                TransportNotice::Error("framing error".into()),
                TransportNotice::Closed,
            ]
        );
    }

    #[test]
    fn test_delivery_after_shutdown_is_ignored() {
        let (tx, rx) = supervisor_channel();
        let events = TransportEvents::new(tx, 1);
        drop(rx);

        assert!(events.is_closed());
        events.data(vec![1, 2, 3]);
        events.closed();
    }
}
