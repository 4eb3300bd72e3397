use crate::backoff::ReconnectPolicy;
use crate::config::SupervisionConfig;
use crate::prober::HeartbeatProber;
use futures_channel::mpsc;
use link_protocol::{
    DisconnectReason, Event, EventKind, LinkConfig, LinkError, LinkState, LinkStatus, OpenError,
    WriteError,
};
use link_runtime::{
    link_debug, link_info, link_warn, Actor, ObserverRegistry, SupervisorMessage, TimerKind,
    TimerSlot, TimerSpawner, TimerTicket, Transport, TransportEvents, TransportLink,
    TransportNotice,
};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

/// LinkSupervisor owns one logical serial link and keeps it alive
///
/// Responsibilities:
/// - Maintain the single source of truth for the link state
/// - Validate and execute state transitions
/// - Open, probe, close and reopen the transport
/// - Emit every lifecycle change to observers
///
/// ## State Machine
///
/// For the transition diagram and per-state invariants, see
/// `link-protocol/src/state.rs` (`LinkState`).
///
/// Key coordination patterns:
/// - **Generation token**: bumped on every open attempt and on disconnect.
///   Open results and transport notices carry the generation they belong
///   to; anything from an older generation is discarded, and a link opened
///   by a superseded attempt is closed on arrival.
/// - **Timer tickets**: at most one timer per kind. A firing is acted on
///   only if its ticket matches the armed one, so a late probe response or
///   a cancelled timeout can never undo a committed transition.
/// - **Config freeze**: `configure` only stages a config. A session runs
///   with the config it was connected with until it is torn down.
pub struct LinkSupervisor {
    state: LinkState,
    transport: Arc<dyn Transport>,
    supervision: SupervisionConfig,
    self_tx: mpsc::UnboundedSender<SupervisorMessage>,
    timers: TimerSpawner,
    observers: ObserverRegistry,

    // Staged by configure, consumed by the next explicit connect
    pending_config: Option<LinkConfig>,

    // Session state, cleared on teardown
    active_config: Option<LinkConfig>,
    policy: Option<ReconnectPolicy>,
    prober: Option<HeartbeatProber>,
    link: Option<Box<dyn TransportLink>>,
    pending_open: Option<JoinHandle<()>>,
    connect_timeout: TimerSlot,
    reconnect_delay: TimerSlot,
    attempts: u32,
    last_heartbeat_ok_us: Option<u64>,

    generation: u64,
    event_seq: u64,
    finished: bool,
}

impl LinkSupervisor {
    pub fn new(
        transport: Arc<dyn Transport>,
        supervision: SupervisionConfig,
        self_tx: mpsc::UnboundedSender<SupervisorMessage>,
        observers: ObserverRegistry,
    ) -> Self {
        Self {
            state: LinkState::Disconnected,
            transport,
            supervision,
            timers: TimerSpawner::new(self_tx.clone()),
            self_tx,
            observers,
            pending_config: None,
            active_config: None,
            policy: None,
            prober: None,
            link: None,
            pending_open: None,
            connect_timeout: TimerSlot::default(),
            reconnect_delay: TimerSlot::default(),
            attempts: 0,
            last_heartbeat_ok_us: None,
            generation: 0,
            event_seq: 0,
            finished: false,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Is a probe tick or probe timeout armed?
    pub fn probe_armed(&self) -> bool {
        self.prober.as_ref().is_some_and(|p| p.is_armed())
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            state: self.state,
            endpoint: self.active_config.as_ref().map(|c| c.endpoint_id.clone()),
            attempts: self.attempts,
            generation: self.generation,
            last_heartbeat_ok_us: self.last_heartbeat_ok_us,
        }
    }

    /// Send an event to observers (non-blocking, never fails)
    fn emit(&mut self, kind: EventKind) {
        self.event_seq += 1;
        let event = Event::new(self.event_seq, kind);
        if event.kind.is_lifecycle() {
            link_debug!("Event #{}: {}", event.seq, event.kind.describe());
        }
        self.observers.emit(&event);
    }

    /// Attempt to transition to a new state
    ///
    /// Returns Ok if transition is valid, Err otherwise
    fn transition(&mut self, new_state: LinkState) -> Result<(), LinkError> {
        if !self.state.can_transition_to(new_state) {
            return Err(LinkError::InvalidTransition(format!(
                "{:?} → {:?}",
                self.state, new_state
            )));
        }

        let old_state = self.state;
        self.state = new_state;

        // No probe may stay armed outside the live states
        if !new_state.allows_heartbeat() {
            if let Some(prober) = self.prober.as_mut() {
                prober.stop();
            }
        }

        link_debug!("State: {:?} → {:?}", old_state, new_state);
        self.emit(EventKind::StateChanged {
            from: old_state,
            to: new_state,
        });

        Ok(())
    }

    fn unexpected(&self, message: &str) -> LinkError {
        LinkError::UnexpectedMessage {
            state: format!("{:?}", self.state),
            message: message.into(),
        }
    }

    fn policy(&self) -> Result<ReconnectPolicy, LinkError> {
        self.policy
            .ok_or_else(|| LinkError::InvalidTransition(format!("{:?} without a session", self.state)))
    }

    fn endpoint(&self) -> &str {
        self.active_config
            .as_ref()
            .map(|c| c.endpoint_id.as_str())
            .unwrap_or("<none>")
    }

    fn handle_configure(&mut self, config: LinkConfig) -> Result<(), LinkError> {
        config.validate()?;
        if self.active_config.is_some() {
            link_debug!(
                "Config for {} staged; active session keeps its config until reconnect",
                config.endpoint_id
            );
        }
        self.pending_config = Some(config);
        Ok(())
    }

    fn handle_connect(&mut self) -> Result<(), LinkError> {
        if !self.state.accepts_connect() {
            link_info!("Connect ignored: link is already {:?}", self.state);
            return Ok(());
        }

        let config = self.pending_config.clone().ok_or(LinkError::NotConfigured)?;
        self.begin_session(config);
        self.transition(LinkState::Connecting)?;
        self.start_open()
    }

    fn begin_session(&mut self, config: LinkConfig) {
        self.policy = Some(ReconnectPolicy::for_link(&config, &self.supervision));
        self.prober = config.heartbeat_enabled.then(|| {
            HeartbeatProber::new(
                config.heartbeat_interval(),
                config.heartbeat_payload.clone(),
                self.supervision.probe_timeout_floor(),
            )
        });
        self.attempts = 0;
        self.last_heartbeat_ok_us = None;
        self.active_config = Some(config);
    }

    fn end_session(&mut self) {
        self.active_config = None;
        self.policy = None;
        self.prober = None;
        self.attempts = 0;
    }

    /// Spawn one `Transport::open` for a fresh generation and arm its timeout
    fn start_open(&mut self) -> Result<(), LinkError> {
        let config = self.active_config.as_ref().ok_or(LinkError::NotConfigured)?;

        self.generation += 1;
        let generation = self.generation;
        let endpoint = config.endpoint_id.clone();
        let params = config.line_params();
        let events = TransportEvents::new(self.self_tx.clone(), generation);
        let transport = Arc::clone(&self.transport);
        let tx = self.self_tx.clone();

        link_info!(
            "Opening {} ({}), generation {}",
            endpoint,
            params.describe(),
            generation
        );

        self.pending_open = Some(tokio::spawn(async move {
            let result = transport.open(&endpoint, &params, events).await;
            if let Err(e) = tx.unbounded_send(SupervisorMessage::OpenResult { generation, result }) {
                // Supervisor is gone: nobody will ever close this link
                if let SupervisorMessage::OpenResult {
                    result: Ok(mut link),
                    ..
                } = e.into_inner()
                {
                    link.close();
                }
            }
        }));

        self.connect_timeout.arm(
            &self.timers,
            TimerKind::ConnectTimeout,
            generation,
            self.supervision.connect_timeout(),
        );
        Ok(())
    }

    fn abort_open(&mut self) {
        if let Some(task) = self.pending_open.take() {
            task.abort();
        }
        self.connect_timeout.disarm();
    }

    fn close_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close();
        }
    }

    fn handle_open_result(
        &mut self,
        generation: u64,
        result: Result<Box<dyn TransportLink>, OpenError>,
    ) -> Result<(), LinkError> {
        // Validate generation to prevent orphan links from superseded attempts
        if generation != self.generation
            || self.pending_open.is_none()
            || !self.state.is_connecting()
        {
            if let Ok(mut link) = result {
                link.close();
            }
            return Err(LinkError::InvalidTransition(format!(
                "Stale open result (generation={}, current={})",
                generation, self.generation
            )));
        }

        self.pending_open = None;
        self.connect_timeout.disarm();

        match result {
            Ok(link) => {
                self.link = Some(link);
                self.on_opened()
            }
            Err(e) => self.on_open_failed(DisconnectReason::OpenFailed(e.to_string())),
        }
    }

    fn on_opened(&mut self) -> Result<(), LinkError> {
        let reconnected = self.state == LinkState::Reconnecting;
        self.attempts = 0;
        self.transition(LinkState::Connected)?;

        if reconnected {
            self.emit(EventKind::ReconnectSucceeded);
        }
        self.emit(EventKind::Connected);
        link_info!("Connected to {}", self.endpoint());

        let generation = self.generation;
        if let Some(prober) = self.prober.as_mut() {
            prober.start(&self.timers, generation);
        }
        Ok(())
    }

    fn on_open_failed(&mut self, reason: DisconnectReason) -> Result<(), LinkError> {
        link_info!("Open of {} failed: {}", self.endpoint(), reason);
        let policy = self.policy()?;

        match self.state {
            LinkState::Connecting => {
                self.emit(EventKind::Disconnected { reason });
                let heartbeat = self
                    .active_config
                    .as_ref()
                    .is_some_and(|c| c.heartbeat_enabled);

                if heartbeat && !policy.should_stop(self.attempts) {
                    self.transition(LinkState::Reconnecting)?;
                    self.schedule_reconnect(&policy);
                } else {
                    self.transition(LinkState::Disconnected)?;
                    self.end_session();
                }
                Ok(())
            }
            LinkState::Reconnecting => {
                self.attempts = self.attempts.saturating_add(1);
                self.emit(EventKind::ReconnectAttempt {
                    attempt: self.attempts,
                    delay_ms: policy.next_delay(self.attempts).as_millis() as u64,
                });

                if policy.should_stop(self.attempts) {
                    self.exhaust()
                } else {
                    self.schedule_reconnect(&policy);
                    Ok(())
                }
            }
            _ => Err(self.unexpected("OpenFailed")),
        }
    }

    fn schedule_reconnect(&mut self, policy: &ReconnectPolicy) {
        let delay = policy.next_delay(self.attempts);
        link_info!(
            "Reconnecting to {} in {:?} (attempt {}/{})",
            self.endpoint(),
            delay,
            self.attempts + 1,
            policy.max_attempts
        );
        self.reconnect_delay.arm(
            &self.timers,
            TimerKind::ReconnectDelay,
            self.generation,
            delay,
        );
    }

    fn exhaust(&mut self) -> Result<(), LinkError> {
        self.transition(LinkState::ReconnectExhausted)?;
        link_warn!(
            "Giving up on {} after {} reconnect attempts",
            self.endpoint(),
            self.attempts
        );
        self.emit(EventKind::ReconnectExhausted {
            attempts: self.attempts,
        });
        Ok(())
    }

    /// Failure on a live link: close it, then reconnect or give up
    fn degrade(&mut self) -> Result<(), LinkError> {
        if let Some(prober) = self.prober.as_mut() {
            prober.stop();
        }
        self.close_link();
        self.transition(LinkState::Degraded)?;

        let policy = self.policy()?;
        if policy.should_stop(self.attempts) {
            self.exhaust()
        } else {
            self.transition(LinkState::Reconnecting)?;
            self.schedule_reconnect(&policy);
            Ok(())
        }
    }

    fn handle_transport(&mut self, generation: u64, notice: TransportNotice) -> Result<(), LinkError> {
        if generation != self.generation || self.link.is_none() {
            link_debug!(
                "Ignoring transport notice from generation {} (current {}, link open: {})",
                generation,
                self.generation,
                self.link.is_some()
            );
            return Ok(());
        }

        match notice {
            TransportNotice::Data(bytes) => self.on_data(bytes),
            TransportNotice::Error(reason) => {
                link_warn!("Transport error on {}: {}", self.endpoint(), reason);
                if self.state == LinkState::Probing {
                    self.emit(EventKind::HeartbeatFailed { reason });
                } else {
                    self.emit(EventKind::Disconnected {
                        reason: DisconnectReason::TransportError(reason),
                    });
                }
                self.degrade()
            }
            TransportNotice::Closed => {
                link_warn!("{} closed unexpectedly", self.endpoint());
                self.emit(EventKind::Disconnected {
                    reason: DisconnectReason::TransportClosed,
                });
                self.degrade()
            }
        }
    }

    /// Inbound data. While a probe is outstanding any data answers it.
    fn on_data(&mut self, bytes: Vec<u8>) -> Result<(), LinkError> {
        if self.state == LinkState::Probing {
            let generation = self.generation;
            let timers = &self.timers;
            let rtt = self
                .prober
                .as_mut()
                .and_then(|p| p.acknowledge(timers, generation));

            if let Some(rtt) = rtt {
                self.transition(LinkState::Connected)?;
                self.last_heartbeat_ok_us = Some(now_us());
                self.emit(EventKind::HeartbeatOk {
                    rtt_ms: rtt.as_millis() as u64,
                });
            }
        }

        self.emit(EventKind::DataReceived { bytes });
        Ok(())
    }

    fn handle_timer(&mut self, ticket: TimerTicket) -> Result<(), LinkError> {
        match ticket.kind {
            TimerKind::ConnectTimeout => {
                if !self.connect_timeout.fire(&ticket) {
                    return self.stale_timer(&ticket);
                }
                if let Some(task) = self.pending_open.take() {
                    task.abort();
                }
                let timeout_ms = self.supervision.connect_timeout_ms;
                self.on_open_failed(DisconnectReason::ConnectTimeout { timeout_ms })
            }
            TimerKind::ReconnectDelay => {
                if !self.reconnect_delay.fire(&ticket) {
                    return self.stale_timer(&ticket);
                }
                if self.state != LinkState::Reconnecting {
                    return Err(self.unexpected("ReconnectDelay"));
                }
                self.start_open()
            }
            TimerKind::ProbeTick => {
                let accepted = self
                    .prober
                    .as_mut()
                    .is_some_and(|p| p.accept_tick(&ticket));
                if !accepted {
                    return self.stale_timer(&ticket);
                }
                self.send_probe()
            }
            TimerKind::ProbeTimeout => {
                let accepted = self
                    .prober
                    .as_mut()
                    .is_some_and(|p| p.accept_timeout(&ticket));
                if !accepted {
                    return self.stale_timer(&ticket);
                }
                let timeout = self
                    .prober
                    .as_ref()
                    .map(HeartbeatProber::response_timeout)
                    .unwrap_or_default();
                link_warn!(
                    "No probe response from {} within {:?}",
                    self.endpoint(),
                    timeout
                );
                self.emit(EventKind::HeartbeatFailed {
                    reason: format!("no response within {} ms", timeout.as_millis()),
                });
                self.degrade()
            }
        }
    }

    fn stale_timer(&self, ticket: &TimerTicket) -> Result<(), LinkError> {
        link_debug!(
            "Ignoring stale {:?} timer (generation {}, seq {})",
            ticket.kind,
            ticket.generation,
            ticket.seq
        );
        Ok(())
    }

    fn send_probe(&mut self) -> Result<(), LinkError> {
        if self.state != LinkState::Connected {
            return Err(self.unexpected("ProbeTick"));
        }

        let generation = self.generation;
        let (Some(prober), Some(link)) = (self.prober.as_mut(), self.link.as_mut()) else {
            return Err(LinkError::InvalidTransition(
                "Probe tick without an open link".into(),
            ));
        };

        match prober.send_probe(link.as_mut(), &self.timers, generation) {
            Ok(payload) => {
                self.transition(LinkState::Probing)?;
                self.emit(EventKind::HeartbeatSent { payload });
                Ok(())
            }
            Err(e) => {
                link_warn!("Probe write to {} failed: {}", self.endpoint(), e);
                self.emit(EventKind::HeartbeatFailed {
                    reason: e.to_string(),
                });
                self.degrade()
            }
        }
    }

    fn handle_send(&mut self, bytes: Vec<u8>) -> Result<(), WriteError> {
        if !self.state.is_link_open() {
            return Err(WriteError::NotConnected);
        }
        let link = self.link.as_mut().ok_or(WriteError::NotConnected)?;
        link.write(&bytes)?;
        self.emit(EventKind::DataSent { bytes });
        Ok(())
    }

    /// Cancel every timer, abort any open in flight, close the link and
    /// invalidate everything still queued for this generation
    fn teardown(&mut self) {
        if let Some(prober) = self.prober.as_mut() {
            prober.stop();
        }
        self.abort_open();
        self.reconnect_delay.disarm();
        self.close_link();
        self.generation += 1;
    }

    fn handle_disconnect(&mut self) -> Result<(), LinkError> {
        self.teardown();

        if self.state == LinkState::Disconnected {
            link_debug!("Disconnect ignored: already disconnected");
            return Ok(());
        }

        link_info!("Disconnecting from {}", self.endpoint());
        self.emit(EventKind::Disconnected {
            reason: DisconnectReason::Explicit,
        });
        self.transition(LinkState::Disconnected)?;
        self.end_session();
        Ok(())
    }

    fn handle_shutdown(&mut self) {
        self.teardown();
        self.end_session();
        self.state = LinkState::Disconnected;
        // Ends every subscription stream
        self.observers.clear();
        self.finished = true;
        link_debug!("LinkSupervisor shut down");
    }
}

fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

impl Actor for LinkSupervisor {
    type Message = SupervisorMessage;

    fn name(&self) -> &'static str {
        "LinkSupervisor"
    }

    async fn handle(&mut self, msg: Self::Message) -> Result<(), LinkError> {
        match msg {
            SupervisorMessage::Configure(config) => self.handle_configure(config),
            SupervisorMessage::Connect { reply } => {
                let result = self.handle_connect();
                // Caller may have stopped waiting; the connect still happened
                let _ = reply.send(result.clone());
                result
            }
            SupervisorMessage::Disconnect => self.handle_disconnect(),
            SupervisorMessage::Send { bytes, reply } => {
                let _ = reply.send(self.handle_send(bytes));
                Ok(())
            }
            SupervisorMessage::Status { reply } => {
                let _ = reply.send(self.status());
                Ok(())
            }
            SupervisorMessage::Shutdown => {
                self.handle_shutdown();
                Ok(())
            }
            SupervisorMessage::OpenResult { generation, result } => {
                self.handle_open_result(generation, result)
            }
            SupervisorMessage::Transport { generation, notice } => {
                self.handle_transport(generation, notice)
            }
            SupervisorMessage::TimerFired(ticket) => self.handle_timer(ticket),
        }
    }

    async fn shutdown(&mut self) {
        if !self.finished {
            self.handle_shutdown();
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
