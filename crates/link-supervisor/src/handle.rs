use crate::config::SupervisionConfig;
use crate::constants;
use crate::supervisor::LinkSupervisor;
use futures_channel::{mpsc, oneshot};
use link_protocol::{LinkConfig, LinkError, LinkStatus, OpenError};
use link_runtime::{
    link_info, link_warn, supervisor_channel, Actor, ObserverRegistry, Subscription,
    SubscriptionId, SupervisorMessage, Transport, TransportEvents,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Caller-side handle to a running `LinkSupervisor`
///
/// Every method only enqueues a message; the supervisor task applies them
/// one at a time in the order they were sent. Dropping the handle shuts
/// the supervisor down.
pub struct LinkHandle {
    tx: mpsc::UnboundedSender<SupervisorMessage>,
    observers: ObserverRegistry,
    task: Option<JoinHandle<()>>,
}

fn closed() -> LinkError {
    LinkError::ChannelClosed("LinkSupervisor has shut down".into())
}

impl LinkHandle {
    /// Spawn a supervisor for `transport` on the current tokio runtime
    pub fn spawn(transport: Arc<dyn Transport>, supervision: SupervisionConfig) -> Self {
        let (tx, rx) = supervisor_channel();
        let observers = ObserverRegistry::new(supervision.observer_queue_capacity);
        let supervisor =
            LinkSupervisor::new(transport, supervision, tx.clone(), observers.clone());
        let task = tokio::spawn(async move { supervisor.run(rx).await });

        Self {
            tx,
            observers,
            task: Some(task),
        }
    }

    fn post(&self, msg: SupervisorMessage) -> Result<(), LinkError> {
        self.tx.unbounded_send(msg).map_err(|_| closed())
    }

    /// Stage the config for the next `connect`. A live session keeps the
    /// config it was started with.
    pub fn configure(&self, config: LinkConfig) -> Result<(), LinkError> {
        config.validate()?;
        self.post(SupervisorMessage::Configure(config))
    }

    /// Start a connection with the staged config.
    ///
    /// Resolves once the attempt has started, not when it completes; watch
    /// the event stream for `Connected`. A no-op while already connecting
    /// or connected.
    pub async fn connect(&self) -> Result<(), LinkError> {
        let (reply, rx) = oneshot::channel();
        self.post(SupervisorMessage::Connect { reply })?;
        rx.await.map_err(|_| closed())?
    }

    /// `configure` then `connect`
    pub async fn connect_with(&self, config: LinkConfig) -> Result<(), LinkError> {
        self.configure(config)?;
        self.connect().await
    }

    /// Cancel everything and close the link. Idempotent.
    pub fn disconnect(&self) -> Result<(), LinkError> {
        self.post(SupervisorMessage::Disconnect)
    }

    /// Write bytes to the open link
    pub async fn send(&self, bytes: impl Into<Vec<u8>>) -> Result<(), LinkError> {
        let (reply, rx) = oneshot::channel();
        self.post(SupervisorMessage::Send {
            bytes: bytes.into(),
            reply,
        })?;
        Ok(rx.await.map_err(|_| closed())??)
    }

    pub async fn status(&self) -> Result<LinkStatus, LinkError> {
        let (reply, rx) = oneshot::channel();
        self.post(SupervisorMessage::Status { reply })?;
        rx.await.map_err(|_| closed())
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&self) -> Subscription {
        self.observers.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Stop the supervisor and wait for it to release the link
    pub async fn shutdown(mut self) {
        let _ = self.tx.unbounded_send(SupervisorMessage::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                link_warn!("LinkSupervisor task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for LinkHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.tx.unbounded_send(SupervisorMessage::Shutdown);
        }
    }
}

impl std::fmt::Debug for LinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkHandle")
            .field("observers", &self.observers)
            .field("running", &self.task.is_some())
            .finish()
    }
}

/// Open and immediately close `config.endpoint_id`, outside any session.
///
/// No events are emitted and no supervisor state is touched.
pub async fn test_connection(transport: &dyn Transport, config: &LinkConfig) -> Result<(), LinkError> {
    config.validate()?;

    // Nobody listens: notices from the throwaway link are dropped
    let (tx, _rx) = supervisor_channel();
    let events = TransportEvents::new(tx, 0);
    let timeout = Duration::from_millis(constants::connect::TIMEOUT_MS);

    let params = config.line_params();
    let open = transport.open(&config.endpoint_id, &params, events);
    let mut link = tokio::time::timeout(timeout, open)
        .await
        .map_err(|_| OpenError::Timeout(constants::connect::TIMEOUT_MS))??;
    link.close();

    link_info!("Connection test passed for {}", config.endpoint_id);
    Ok(())
}
