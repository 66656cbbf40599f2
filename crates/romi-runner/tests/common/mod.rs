#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use romi_client::config::{BotConfig, SortRegion};
use romi_client::sim::SimServer;
use romi_events::{BlockPos, BotEvent, EventEnvelope, SessionStatus};
use romi_runner::{Bot, BotHandle, Relay};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time;

pub const FROM: BlockPos = BlockPos::new(10, 64, 10);
pub const TO: BlockPos = BlockPos::new(20, 64, 10);

pub fn config() -> BotConfig {
    let mut config = BotConfig::default();
    config.sort.region = SortRegion { from: FROM, to: TO };
    config
}

pub struct Running {
    pub server: SimServer,
    pub handle: BotHandle,
    pub events: broadcast::Receiver<EventEnvelope>,
    pub status: watch::Receiver<SessionStatus>,
    pub task: JoinHandle<()>,
}

impl Running {
    pub fn start(server: SimServer, config: BotConfig) -> Self {
        Self::start_with(server, config, Relay::disabled())
    }

    pub fn start_with(server: SimServer, config: BotConfig, relay: Relay) -> Self {
        let bot = Bot::new(config, Arc::new(server.connector()), relay);
        let handle = bot.handle();
        let events = bot.subscribe();
        let status = bot.status();
        let task = tokio::spawn(bot.run());
        Self {
            server,
            handle,
            events,
            status,
            task,
        }
    }

    /// Wait (on the paused clock) for the first event matching `pred`
    pub async fn wait_for<F>(&mut self, pred: F) -> BotEvent
    where
        F: Fn(&BotEvent) -> bool,
    {
        time::timeout(Duration::from_secs(600), async {
            loop {
                match self.events.recv().await {
                    Ok(envelope) if pred(&envelope.event) => return envelope.event,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    pub async fn connected(&mut self) -> u64 {
        match self
            .wait_for(|e| matches!(e, BotEvent::Connected { .. }))
            .await
        {
            BotEvent::Connected { generation } => generation,
            _ => unreachable!(),
        }
    }

    /// Player chat into the game; returns once the bot has handled it
    pub async fn say(&self, sender: &str, message: &str) {
        assert!(self.server.say(Some(sender), message), "no live session to hear chat");
        settle().await;
    }

    pub async fn console(&self, line: &str) {
        assert!(self.handle.console_line(line));
        settle().await;
    }

    pub fn drain(&mut self) -> Vec<BotEvent> {
        let mut out = Vec::new();
        while let Ok(envelope) = self.events.try_recv() {
            out.push(envelope.event);
        }
        out
    }
}

/// Let spawned tasks run without moving the clock far
pub async fn settle() {
    time::sleep(Duration::from_millis(1)).await;
}
