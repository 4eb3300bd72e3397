use crate::{link_debug, link_error, link_warn};
use futures::stream::StreamExt;
use futures_channel::mpsc;
use link_protocol::LinkError;

/// Actor trait for message-driven components
///
/// An actor owns its state and processes messages one at a time from a
/// single queue, so nothing else ever mutates that state.
///
/// # Lifecycle
///
/// 1. **init()** - Called once before message processing starts
/// 2. **handle()** - Called for each received message
/// 3. **shutdown()** - Called when the actor is stopping
///
/// The loop stops when the queue closes or `is_finished()` turns true after
/// a message. Errors from `handle()` are logged and never stop the loop.
///
/// # Example
///
/// ```ignore
/// struct Echo;
///
/// impl Actor for Echo {
///     type Message = String;
///
///     fn name(&self) -> &'static str {
///         "Echo"
///     }
///
///     async fn handle(&mut self, msg: Self::Message) -> Result<(), LinkError> {
///         println!("{}", msg);
///         Ok(())
///     }
/// }
/// ```
#[allow(async_fn_in_trait)]
pub trait Actor: Send + 'static {
    /// Message type this actor processes
    type Message: Send + 'static;

    /// Actor name (used for logging)
    fn name(&self) -> &'static str;

    /// Initialize the actor before processing messages
    async fn init(&mut self) -> Result<(), LinkError> {
        Ok(())
    }

    /// Handle a single message
    async fn handle(&mut self, msg: Self::Message) -> Result<(), LinkError>;

    /// Clean up before the loop exits
    async fn shutdown(&mut self) {}

    /// Checked after every message; true ends the loop
    fn is_finished(&self) -> bool {
        false
    }

    /// Main run loop
    ///
    /// Consumes the actor and runs it to completion.
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Self::Message>)
    where
        Self: Sized,
    {
        if let Err(e) = self.init().await {
            link_error!("{} init failed: {}", self.name(), e);
            return;
        }

        link_debug!("{} started", self.name());

        while let Some(msg) = rx.next().await {
            if let Err(e) = self.handle(msg).await {
                link_warn!("{} error: {}", self.name(), e);
            }
            if self.is_finished() {
                break;
            }
        }

        self.shutdown().await;

        link_debug!("{} stopped", self.name());
    }
}
