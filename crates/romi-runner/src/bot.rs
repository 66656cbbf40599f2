//! The bot: one event loop that owns the session controller, the scheduler
//! and every behavior.
//!
//! Inputs arrive on per-source channels (timer firings, session signals,
//! front-end messages) and are handled one at a time, so nothing here needs
//! a lock. Work that has to wait, like connecting or a sort run, is spawned
//! and reports back through those channels.

use std::sync::Arc;
use std::time::Duration;

use romi_client::Connector;
use romi_client::config::{BotConfig, SessionConfigUpdate};
use romi_events::{
    Behavior, BotEvent, ChatSource, InboundMessage, SessionState, SessionStatus,
};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::behaviors::{AntiIdle, Repeater, SortBehavior, SortStart};
use crate::commands::{
    CHAT_HELP, ChatCommand, CommandError, ConsoleCommand, Toggle, console_help,
    parse_chat_command, parse_console_command,
};
use crate::controller::{SessionChange, SessionController, SessionSignal};
use crate::event_bus::EventBus;
use crate::relay::{Relay, should_forward};
use crate::scheduler::{Fired, TaskScheduler};

const EVENT_BUS_CAPACITY: usize = 256;

/// Timer actions; the loop maps each to a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    AntiIdle,
    ReleaseJump,
    Sort,
    Repeat,
    Reconnect,
}

/// Messages from front-ends into the loop
#[derive(Debug, Clone)]
pub enum ControlMsg {
    Inbound(InboundMessage),
    Shutdown,
}

/// Cloneable handle front-ends use to talk to a running [`Bot`]
#[derive(Debug, Clone)]
pub struct BotHandle {
    tx: mpsc::UnboundedSender<ControlMsg>,
}

impl BotHandle {
    /// Returns false once the bot has stopped
    pub fn send(&self, message: InboundMessage) -> bool {
        self.tx.send(ControlMsg::Inbound(message)).is_ok()
    }

    pub fn console_line(&self, line: impl Into<String>) -> bool {
        self.send(InboundMessage::console(line))
    }

    pub fn remote_message(
        &self,
        author: impl Into<String>,
        text: impl Into<String>,
        automated: bool,
    ) -> bool {
        self.send(InboundMessage::remote(author, text, automated))
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(ControlMsg::Shutdown);
    }
}

pub struct Bot {
    controller: SessionController,
    scheduler: TaskScheduler<TaskAction>,
    anti_idle: AntiIdle,
    sort: SortBehavior,
    repeater: Repeater,
    relay: Relay,
    events: EventBus,
    fired_rx: mpsc::UnboundedReceiver<Fired<TaskAction>>,
    signal_rx: mpsc::UnboundedReceiver<SessionSignal>,
    control_tx: mpsc::UnboundedSender<ControlMsg>,
    control_rx: mpsc::UnboundedReceiver<ControlMsg>,
}

impl Bot {
    pub fn new(config: BotConfig, connector: Arc<dyn Connector>, relay: Relay) -> Self {
        let sort = SortBehavior::new(&config.sort);
        Self::with_sort(config, connector, relay, sort)
    }

    /// Build with a custom sort behavior (pipeline timing, interval)
    pub fn with_sort(
        config: BotConfig,
        connector: Arc<dyn Connector>,
        relay: Relay,
        sort: SortBehavior,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (scheduler, fired_rx) = TaskScheduler::new();
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        Self {
            controller: SessionController::new(config.session, connector, signal_tx),
            scheduler,
            anti_idle: AntiIdle::new(Duration::from_millis(config.anti_afk_interval_ms)),
            sort,
            repeater: Repeater::default(),
            relay,
            events: EventBus::new(EVENT_BUS_CAPACITY),
            fired_rx,
            signal_rx,
            control_tx,
            control_rx,
        }
    }

    pub fn handle(&self) -> BotHandle {
        BotHandle {
            tx: self.control_tx.clone(),
        }
    }

    pub fn event_bus(&self) -> EventBus {
        self.events.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<romi_events::EventEnvelope> {
        self.events.subscribe()
    }

    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.controller.status()
    }

    /// Connect and process inputs until shut down
    pub async fn run(mut self) {
        if !self.relay.is_enabled() {
            info!(target: "relay", "Remote relay not configured; chat stays in game");
        }
        self.controller.connect(&self.events);

        loop {
            tokio::select! {
                Some(fired) = self.fired_rx.recv() => {
                    if let Some(action) = self.scheduler.accept(fired) {
                        self.on_task(action);
                    }
                }
                Some(signal) = self.signal_rx.recv() => {
                    let change = self.controller.handle_signal(signal, &mut self.scheduler, &self.events);
                    self.on_session_change(change);
                }
                Some(msg) = self.control_rx.recv() => match msg {
                    ControlMsg::Inbound(message) => self.on_inbound(message),
                    ControlMsg::Shutdown => self.shutdown(),
                },
                else => break,
            }

            if self.controller.state() == SessionState::Shutdown {
                break;
            }
        }

        info!("Bot stopped");
    }

    fn on_task(&mut self, action: TaskAction) {
        let session = self.controller.handle();
        let session = session.as_deref();

        match action {
            TaskAction::AntiIdle => {
                if let Err(e) = self.anti_idle.tick(session, &mut self.scheduler) {
                    warn!(target: "behavior", "Anti-AFK failed: {}", e);
                }
            }
            TaskAction::ReleaseJump => {
                if let Err(e) = self.anti_idle.release_jump(session) {
                    debug!(target: "behavior", "Could not release jump: {}", e);
                }
            }
            TaskAction::Sort => self.start_sort(),
            TaskAction::Repeat => {
                if let Err(e) = self.repeater.tick(session) {
                    warn!(target: "behavior", "Repeat failed: {}", e);
                }
            }
            TaskAction::Reconnect => self.controller.on_reconnect_timer(&self.events),
        }
    }

    fn on_session_change(&mut self, change: Option<SessionChange>) {
        match change {
            Some(SessionChange::Connected) => {
                self.anti_idle.on_connected(&mut self.scheduler);
                self.sort.on_connected(&mut self.scheduler);
                self.repeater.on_connected(&mut self.scheduler);
            }
            Some(SessionChange::Lost) => self.disarm_behaviors(),
            Some(SessionChange::Chat { sender, message }) => self.on_game_chat(sender, message),
            None => {}
        }
    }

    fn disarm_behaviors(&mut self) {
        self.anti_idle.on_disconnected(&mut self.scheduler);
        self.sort.on_disconnected(&mut self.scheduler);
        self.repeater.on_disconnected(&mut self.scheduler);
    }

    fn on_inbound(&mut self, message: InboundMessage) {
        match message.source {
            ChatSource::GameChat => self.on_game_chat(message.author, message.text),
            ChatSource::Console => self.on_console(&message.text),
            ChatSource::RemoteChannel => self.on_remote(message),
        }
    }

    fn on_game_chat(&mut self, sender: Option<String>, message: String) {
        match &sender {
            Some(sender) => info!(target: "chat", "<{}> {}", sender, message),
            None => info!(target: "chat", "{}", message),
        }
        self.relay.mirror(sender.as_deref(), &message);

        // Our own lines (repeater, replies) never trigger commands
        let own_name = self.controller.handle().map(|s| s.username());
        if sender.is_some() && sender == own_name {
            return;
        }

        match parse_chat_command(&message) {
            Some(Ok(command)) => self.on_chat_command(command),
            Some(Err(e)) => self.reply(ChatSource::GameChat, &e.to_string()),
            None => {}
        }
    }

    fn on_chat_command(&mut self, command: ChatCommand) {
        let connected = self.controller.is_connected();
        match command {
            ChatCommand::AntiIdle(Toggle::On) => {
                self.anti_idle.enable(&mut self.scheduler, connected);
                self.toggled(Behavior::AntiIdle, true);
                self.reply(ChatSource::GameChat, "AFK Mode Enabled");
            }
            ChatCommand::AntiIdle(Toggle::Off) => {
                if self.anti_idle.disable(&mut self.scheduler) {
                    self.toggled(Behavior::AntiIdle, false);
                }
                self.reply(ChatSource::GameChat, "AFK Mode Disabled");
            }
            ChatCommand::Help => self.reply(ChatSource::GameChat, CHAT_HELP),
            ChatCommand::Status => {
                let status = self.status_line();
                self.reply(ChatSource::GameChat, &status);
            }
            ChatCommand::Sort(Toggle::On) => {
                self.sort.enable(&mut self.scheduler, connected);
                self.toggled(Behavior::Sort, true);
                self.reply(ChatSource::GameChat, "Chest sorting enabled!");
                self.start_sort();
            }
            ChatCommand::Sort(Toggle::Off) => {
                if self.sort.disable(&mut self.scheduler) {
                    self.toggled(Behavior::Sort, false);
                }
                self.reply(ChatSource::GameChat, "Chest sorting disabled!");
            }
            ChatCommand::RepeatOn(message) => {
                let ack = format!("Repeat enabled: \"{}\"", message);
                self.repeater.enable(message, &mut self.scheduler, connected);
                self.toggled(Behavior::Repeat, true);
                self.reply(ChatSource::GameChat, &ack);
            }
            ChatCommand::RepeatOff => {
                if self.repeater.disable(&mut self.scheduler) {
                    self.toggled(Behavior::Repeat, false);
                }
                self.reply(ChatSource::GameChat, "Repeat disabled!");
            }
            ChatCommand::SetAddress { host, port } => {
                self.reply(ChatSource::GameChat, &format!("Server IP set to {}:{}", host, port));
                self.update_config(SessionConfigUpdate::address(host, port));
            }
            ChatCommand::SetIdentity(name) => {
                self.reply(ChatSource::GameChat, &format!("Username set to {}", name));
                self.update_config(SessionConfigUpdate::identity(name));
            }
            ChatCommand::ShowAddress => {
                let address = format!("Current Server: {}", self.controller.config().address());
                self.reply(ChatSource::GameChat, &address);
            }
        }
    }

    fn on_console(&mut self, line: &str) {
        let command = match parse_console_command(line) {
            Some(Ok(command)) => command,
            Some(Err(e @ CommandError::Unknown(_))) => {
                warn!(target: "console", "{} (type 'help')", e);
                return;
            }
            Some(Err(e)) => {
                self.reply(ChatSource::Console, &e.to_string());
                return;
            }
            None => return,
        };

        match command {
            ConsoleCommand::SetAddress { host, port } => {
                self.reply(ChatSource::Console, &format!("Server IP set to {}:{}", host, port));
                self.update_config(SessionConfigUpdate::address(host, port));
            }
            ConsoleCommand::SetIdentity(name) => {
                self.reply(ChatSource::Console, &format!("Username set to {}", name));
                self.update_config(SessionConfigUpdate::identity(name));
            }
            ConsoleCommand::Status => {
                let status = self.status_line();
                self.reply(ChatSource::Console, &status);
            }
            ConsoleCommand::Help => {
                for line in console_help() {
                    self.reply(ChatSource::Console, &line);
                }
            }
            ConsoleCommand::Exit => self.shutdown(),
        }
    }

    fn on_remote(&mut self, message: InboundMessage) {
        if !should_forward(&message) {
            debug!(target: "relay", "Not forwarding remote message: {:?}", message.text);
            return;
        }

        let author = message.author.as_deref().unwrap_or("unknown");
        info!(target: "relay", "[Discord] {}: {}", author, message.text);

        match self.controller.handle() {
            Some(session) => match session.chat(&message.text) {
                Ok(()) => info!(target: "relay", "Sent to MC: {}", message.text),
                Err(e) => error!(target: "relay", "Failed to send to MC: {}", e),
            },
            None => error!(target: "relay", "Bot not connected - cannot send message"),
        }
    }

    /// Reply on the channel a command came from
    fn reply(&self, source: ChatSource, text: &str) {
        match source {
            ChatSource::GameChat => match self.controller.handle() {
                Some(session) => {
                    if let Err(e) = session.chat(text) {
                        warn!(target: "chat", "Could not reply in chat: {}", e);
                    }
                }
                None => debug!(target: "chat", "Dropping reply while offline: {}", text),
            },
            ChatSource::Console => info!(target: "console", "{}", text),
            ChatSource::RemoteChannel => {}
        }
    }

    fn status_line(&self) -> String {
        match self.controller.handle().and_then(|s| s.vitals()) {
            Some(vitals) => format!(
                "Health: {}/20, Food: {}/20",
                vitals.health.floor() as i32,
                vitals.food
            ),
            None => "Bot not connected".to_string(),
        }
    }

    fn toggled(&self, behavior: Behavior, enabled: bool) {
        info!(target: "behavior", "{} {}", behavior, if enabled { "enabled" } else { "disabled" });
        self.events
            .publish(BotEvent::BehaviorToggled { behavior, enabled });
    }

    fn start_sort(&mut self) {
        if !self.sort.is_enabled() {
            return;
        }
        let live = self.controller.live_session();
        if self.sort.start(live, &self.events) == SortStart::Busy {
            debug!(target: "sort", "Sort tick skipped");
        }
    }

    fn update_config(&mut self, update: SessionConfigUpdate) {
        if self
            .controller
            .update_config(update, &mut self.scheduler, &self.events)
        {
            self.disarm_behaviors();
        }
    }

    fn shutdown(&mut self) {
        info!("Shutting down...");
        self.controller.shutdown(&mut self.scheduler, &self.events);
        self.sort.abort();
        self.scheduler.cancel_all();
        self.events.publish(BotEvent::Shutdown);
    }
}
