//! Session lifecycle: connect, liveness loss, reconnect backoff and shutdown.
//!
//! The controller is the single source of truth for whether a session is live.
//! Every connect attempt gets a new generation number; results and events
//! tagged with an older generation are stale and never touch current state.

use std::sync::Arc;
use std::time::Duration;

use romi_client::config::{SessionConfig, SessionConfigUpdate};
use romi_client::{Connection, Connector, SessionError, SessionHandle};
use romi_events::{BotEvent, SessionEvent, SessionState, SessionStatus};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::bot::TaskAction;
use crate::event_bus::EventBus;
use crate::scheduler::{TaskId, TaskScheduler};

/// Delay before an immediate (operator requested) reconnect
pub const IMMEDIATE_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Report from a spawned connect attempt or a session's event stream
pub struct SessionSignal {
    pub generation: u64,
    pub kind: SignalKind,
}

pub enum SignalKind {
    ConnectSucceeded(Connection),
    ConnectFailed(SessionError),
    Event(SessionEvent),
    /// The session's event stream ended
    StreamClosed,
}

/// What a signal meant for the rest of the bot
#[derive(Debug, Clone, PartialEq)]
pub enum SessionChange {
    Connected,
    Lost,
    Chat {
        sender: Option<String>,
        message: String,
    },
}

/// Handle plus the generation it belongs to, for work running off the loop.
///
/// Liveness is read through the controller's status channel, so a holder
/// notices a disconnect without waiting for the event loop.
#[derive(Clone)]
pub struct LiveSession {
    handle: SessionHandle,
    generation: u64,
    status: watch::Receiver<SessionStatus>,
}

impl LiveSession {
    pub fn is_live(&self) -> bool {
        self.status.borrow().is_live_for(self.generation)
    }

    /// The handle, only while its session is still the live one
    pub fn get(&self) -> Option<&SessionHandle> {
        self.is_live().then_some(&self.handle)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

pub struct SessionController {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    state: SessionState,
    generation: u64,
    handle: Option<SessionHandle>,
    pending_reconnect: Option<TaskId>,
    signal_tx: mpsc::UnboundedSender<SessionSignal>,
    status_tx: watch::Sender<SessionStatus>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        signal_tx: mpsc::UnboundedSender<SessionSignal>,
    ) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::default());
        Self {
            config,
            connector,
            state: SessionState::Disconnected,
            generation: 0,
            handle: None,
            pending_reconnect: None,
            signal_tx,
            status_tx,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// The live handle, if any
    pub fn handle(&self) -> Option<SessionHandle> {
        if self.is_connected() {
            self.handle.clone()
        } else {
            None
        }
    }

    pub fn live_session(&self) -> Option<LiveSession> {
        self.handle().map(|handle| LiveSession {
            handle,
            generation: self.generation,
            status: self.status_tx.subscribe(),
        })
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.pending_reconnect.is_some()
    }

    fn transition(&mut self, to: SessionState, events: &EventBus) {
        let from = self.state;
        self.state = to;
        self.status_tx
            .send_replace(SessionStatus::new(to, self.generation));
        if from != to {
            debug!(target: "session", "State {} -> {}", from, to);
            events.publish(BotEvent::StateChanged { from, to });
        }
    }

    /// Start a connect attempt with the current config
    pub fn connect(&mut self, events: &EventBus) {
        match self.state {
            SessionState::Disconnected | SessionState::Reconnecting => {}
            state => {
                debug!(target: "session", "Ignoring connect request while {}", state);
                return;
            }
        }

        self.generation += 1;
        let generation = self.generation;
        self.transition(SessionState::Connecting, events);

        info!(target: "session", "Connecting to {} as {}", self.config.address(), self.config.identity);
        events.publish(BotEvent::ConnectAttempt {
            generation,
            host: self.config.host.clone(),
            port: self.config.port,
            identity: self.config.identity.clone(),
        });

        let connector = Arc::clone(&self.connector);
        let config = self.config.clone();
        let signal_tx = self.signal_tx.clone();
        tokio::spawn(async move {
            let kind = match connector.connect(&config).await {
                Ok(connection) => SignalKind::ConnectSucceeded(connection),
                Err(e) => SignalKind::ConnectFailed(e),
            };
            // Loop gone means shutdown; a handle arriving now has no owner
            if let Err(mpsc::error::SendError(signal)) =
                signal_tx.send(SessionSignal { generation, kind })
            {
                if let SignalKind::ConnectSucceeded(connection) = signal.kind {
                    connection.handle.quit("shutting down");
                }
            }
        });
    }

    /// Apply a signal from a connect attempt or session stream
    pub fn handle_signal(
        &mut self,
        signal: SessionSignal,
        scheduler: &mut TaskScheduler<TaskAction>,
        events: &EventBus,
    ) -> Option<SessionChange> {
        if signal.generation != self.generation || self.state == SessionState::Shutdown {
            if let SignalKind::ConnectSucceeded(connection) = signal.kind {
                debug!(target: "session", "Closing superseded session (generation {})", signal.generation);
                connection.handle.quit("superseded");
            }
            return None;
        }

        match signal.kind {
            SignalKind::ConnectSucceeded(connection) => {
                if self.state != SessionState::Connecting {
                    connection.handle.quit("superseded");
                    return None;
                }
                self.on_connected(connection, events);
                Some(SessionChange::Connected)
            }
            SignalKind::ConnectFailed(e) => {
                if self.state != SessionState::Connecting {
                    return None;
                }
                warn!(target: "session", "Connection failed: {}", e);
                self.transition(SessionState::Reconnecting, events);
                self.reconnect(false, scheduler, events);
                None
            }
            SignalKind::Event(event) if self.is_connected() => match event {
                SessionEvent::Chat { sender, message } => {
                    Some(SessionChange::Chat { sender, message })
                }
                SessionEvent::Kicked { reason } => {
                    warn!(target: "session", "Bot was kicked: {}", reason);
                    self.lose(format!("kicked: {}", reason), scheduler, events);
                    Some(SessionChange::Lost)
                }
                SessionEvent::Disconnected { reason } => {
                    let reason = reason.unwrap_or_else(|| "connection ended".to_string());
                    warn!(target: "session", "Bot disconnected: {}", reason);
                    self.lose(reason, scheduler, events);
                    Some(SessionChange::Lost)
                }
                SessionEvent::Error { message } => {
                    error!(target: "session", "Session error: {}", message);
                    self.lose(format!("error: {}", message), scheduler, events);
                    Some(SessionChange::Lost)
                }
            },
            SignalKind::StreamClosed if self.is_connected() => {
                warn!(target: "session", "Session event stream closed");
                self.lose("event stream closed".to_string(), scheduler, events);
                Some(SessionChange::Lost)
            }
            _ => None,
        }
    }

    fn on_connected(&mut self, connection: Connection, events: &EventBus) {
        let Connection {
            handle,
            events: mut session_events,
        } = connection;

        let generation = self.generation;
        let signal_tx = self.signal_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = session_events.recv().await {
                if signal_tx
                    .send(SessionSignal {
                        generation,
                        kind: SignalKind::Event(event),
                    })
                    .is_err()
                {
                    return;
                }
            }
            let _ = signal_tx.send(SessionSignal {
                generation,
                kind: SignalKind::StreamClosed,
            });
        });

        info!(target: "session", "Logged in as {} on {}", handle.username(), self.config.address());
        self.handle = Some(handle);
        self.transition(SessionState::Connected, events);
        events.publish(BotEvent::Connected { generation });
    }

    /// Mark the current session dead and schedule a regular reconnect
    fn lose(&mut self, reason: String, scheduler: &mut TaskScheduler<TaskAction>, events: &EventBus) {
        if let Some(handle) = self.handle.take() {
            handle.quit(&reason);
        }
        self.transition(SessionState::Reconnecting, events);
        events.publish(BotEvent::Disconnected { reason });
        self.reconnect(false, scheduler, events);
    }

    /// Schedule a connect attempt, replacing any pending one
    pub fn reconnect(
        &mut self,
        immediate: bool,
        scheduler: &mut TaskScheduler<TaskAction>,
        events: &EventBus,
    ) {
        if self.state == SessionState::Shutdown {
            return;
        }
        if let Some(pending) = self.pending_reconnect.take() {
            scheduler.cancel(pending);
        }

        let delay = if immediate {
            IMMEDIATE_RECONNECT_DELAY
        } else {
            Duration::from_millis(self.config.reconnect_delay_ms)
        };
        info!(target: "session", "Reconnecting in {}ms...", delay.as_millis());
        self.pending_reconnect = Some(scheduler.schedule_once(delay, TaskAction::Reconnect));
        events.publish(BotEvent::ReconnectScheduled {
            delay_ms: delay.as_millis() as u64,
            immediate,
        });
    }

    /// The pending reconnect timer fired
    pub fn on_reconnect_timer(&mut self, events: &EventBus) {
        self.pending_reconnect = None;
        self.connect(events);
    }

    /// Change the session config and reconnect with it.
    ///
    /// Any live handle is quit and any in-flight attempt is superseded.
    /// Returns true if a live session was dropped.
    pub fn update_config(
        &mut self,
        update: SessionConfigUpdate,
        scheduler: &mut TaskScheduler<TaskAction>,
        events: &EventBus,
    ) -> bool {
        if self.state == SessionState::Shutdown {
            return false;
        }
        self.config.apply(update);
        info!(target: "session", "Session config is now {}", self.config);

        let was_connected = self.is_connected();
        // Invalidates the current handle and any attempt still in flight
        self.generation += 1;
        if let Some(handle) = self.handle.take() {
            handle.quit("reconfiguring");
        }
        self.transition(SessionState::Reconnecting, events);
        if was_connected {
            events.publish(BotEvent::Disconnected {
                reason: "reconfiguring".to_string(),
            });
        }
        self.reconnect(true, scheduler, events);
        was_connected
    }

    /// Terminal: cancel the reconnect timer and close the handle
    pub fn shutdown(&mut self, scheduler: &mut TaskScheduler<TaskAction>, events: &EventBus) {
        if self.state == SessionState::Shutdown {
            return;
        }
        if let Some(pending) = self.pending_reconnect.take() {
            scheduler.cancel(pending);
        }
        self.generation += 1;
        if let Some(handle) = self.handle.take() {
            handle.quit("shutting down");
        }
        self.transition(SessionState::Shutdown, events);
    }
}
