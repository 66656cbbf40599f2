//! Discord side of the chat relay.

use std::sync::Arc;

use async_trait::async_trait;
use romi_client::config::RemoteChannelConfig;
use romi_runner::{BotHandle, RelayError, RemoteChannel};
use serenity::all::ShardManager;
use serenity::client::{Client, Context, EventHandler};
use serenity::http::Http;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::ChannelId;
use serenity::prelude::GatewayIntents;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Discord channel ids are never zero
pub fn channel_id(config: &RemoteChannelConfig) -> Option<ChannelId> {
    (config.channel_id != 0).then(|| ChannelId::new(config.channel_id))
}

/// Posts mirrored game chat into the configured channel
pub struct DiscordRelay {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl DiscordRelay {
    pub fn new(token: &str, channel_id: ChannelId) -> Self {
        Self {
            http: Arc::new(Http::new(token)),
            channel_id,
        }
    }
}

#[async_trait]
impl RemoteChannel for DiscordRelay {
    async fn send(&self, text: &str) -> Result<(), RelayError> {
        self.channel_id
            .say(&self.http, text)
            .await
            .map(|_| ())
            .map_err(|e| RelayError::Send(e.to_string()))
    }
}

struct Handler {
    channel_id: ChannelId,
    bot: BotHandle,
}

#[serenity::async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _: Context, ready: Ready) {
        info!(target: "relay", "Discord bot logged in as: {}", ready.user.name);
    }

    async fn message(&self, _: Context, msg: Message) {
        if msg.channel_id != self.channel_id {
            return;
        }
        // Our own relay posts come back as bot messages
        let automated = msg.author.bot || msg.webhook_id.is_some();
        self.bot
            .remote_message(msg.author.name.clone(), msg.content.clone(), automated);
    }
}

/// Running gateway connection
pub struct DiscordGateway {
    shard_manager: Arc<ShardManager>,
    task: JoinHandle<()>,
}

impl DiscordGateway {
    /// Log in and start feeding channel messages to the bot
    pub async fn start(
        token: &str,
        channel_id: ChannelId,
        bot: BotHandle,
    ) -> Result<Self, serenity::Error> {
        let mut client = Client::builder(
            token,
            GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT,
        )
        .event_handler(Handler { channel_id, bot })
        .await?;

        let shard_manager = client.shard_manager.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = client.start().await {
                error!(target: "relay", "Discord client error: {}", e);
            }
        });

        Ok(Self {
            shard_manager,
            task,
        })
    }

    pub async fn shutdown(self) {
        self.shard_manager.shutdown_all().await;
        let _ = self.task.await;
        info!(target: "relay", "Discord client shut down");
    }
}
