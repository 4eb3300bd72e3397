use crate::timers::TimerTicket;
use crate::transport::TransportLink;
use futures_channel::{mpsc, oneshot};
use link_protocol::{LinkConfig, LinkError, LinkStatus, OpenError, WriteError};

/// Everything the supervisor driver reacts to, in one ordered queue.
///
/// API calls, timer firings and transport notifications are all serialized
/// here, so the driver is the only place session state changes.
pub enum SupervisorMessage {
    /// Store a validated config for the next explicit connect
    Configure(LinkConfig),
    /// Start a session with the stored config
    Connect {
        reply: oneshot::Sender<Result<(), LinkError>>,
    },
    /// Tear the session down from any state
    Disconnect,
    /// Write bytes to the open link
    Send {
        bytes: Vec<u8>,
        reply: oneshot::Sender<Result<(), WriteError>>,
    },
    /// Snapshot the session
    Status { reply: oneshot::Sender<LinkStatus> },
    /// Destroy the session and stop the driver
    Shutdown,

    /// Outcome of a `Transport::open` started for `generation`
    OpenResult {
        generation: u64,
        result: Result<Box<dyn TransportLink>, OpenError>,
    },
    /// Push notification from a link opened for `generation`
    Transport {
        generation: u64,
        notice: TransportNotice,
    },
    /// An armed timer expired
    TimerFired(TimerTicket),
}

/// Notifications a transport pushes while its link is open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportNotice {
    Data(Vec<u8>),
    Error(String),
    Closed,
}

// Manual Debug implementation: links and reply channels carry no useful state
impl std::fmt::Debug for SupervisorMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configure(config) => f.debug_tuple("Configure").field(config).finish(),
            Self::Connect { .. } => write!(f, "Connect"),
            Self::Disconnect => write!(f, "Disconnect"),
            Self::Send { bytes, .. } => f.debug_struct("Send").field("bytes", bytes).finish(),
            Self::Status { .. } => write!(f, "Status"),
            Self::Shutdown => write!(f, "Shutdown"),
            Self::OpenResult { generation, result } => f
                .debug_struct("OpenResult")
                .field("generation", generation)
                .field(
                    "result",
                    &result.as_ref().map(|_| "<TransportLink>").map_err(|e| e.to_string()),
                )
                .finish(),
            Self::Transport { generation, notice } => f
                .debug_struct("Transport")
                .field("generation", generation)
                .field("notice", notice)
                .finish(),
            Self::TimerFired(ticket) => f.debug_tuple("TimerFired").field(ticket).finish(),
        }
    }
}

impl SupervisorMessage {
    /// Short name used in logs and `UnexpectedMessage` errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::Configure(_) => "Configure",
            Self::Connect { .. } => "Connect",
            Self::Disconnect => "Disconnect",
            Self::Send { .. } => "Send",
            Self::Status { .. } => "Status",
            Self::Shutdown => "Shutdown",
            Self::OpenResult { .. } => "OpenResult",
            Self::Transport { .. } => "Transport",
            Self::TimerFired(_) => "TimerFired",
        }
    }
}

/// Create the supervisor queue.
///
/// The queue is unbounded: timer and transport notifications must never be
/// lost to backpressure, and the only producer that can outpace the driver
/// is inbound serial data, which the driver forwards without blocking.
pub fn supervisor_channel() -> (
    mpsc::UnboundedSender<SupervisorMessage>,
    mpsc::UnboundedReceiver<SupervisorMessage>,
) {
    mpsc::unbounded()
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use futures::stream::StreamExt;

    #[tokio::test]
    async fn test_queue_preserves_order() {
        let (tx, rx) = supervisor_channel();

        tx.unbounded_send(SupervisorMessage::Configure(LinkConfig::default()))
            .unwrap();
        tx.unbounded_send(SupervisorMessage::Disconnect).unwrap();
        tx.unbounded_send(SupervisorMessage::Transport {
            generation: 3,
            notice: TransportNotice::Closed,
        })
        .unwrap();
        drop(tx);

        let names: Vec<_> = rx.map(|m| m.name()).collect().await;
        assert_eq!(names, vec!["Configure", "Disconnect", "Transport"]);
    }

    #[test]
    fn test_closed_queue_is_detected() {
        let (tx, rx) = supervisor_channel();
        drop(rx);

        let result = tx.unbounded_send(SupervisorMessage::Shutdown);
        match result {
            Err(e) => assert!(e.is_disconnected()),
            Ok(_) => panic!("Should not succeed"),
        }
    }

    #[test]
    fn test_debug_hides_link() {
        let msg = SupervisorMessage::OpenResult {
            generation: 2,
            result: Err(OpenError::Busy("COM3".into())),
        };
        let text = format!("{:?}", msg);
        assert!(text.contains("generation: 2"));
        assert!(text.contains("COM3"));
    }
}
