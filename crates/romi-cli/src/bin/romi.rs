use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use romi_client::config::BotConfig;
use romi_client::sim::SimServer;
use romi_runner::logging::init_logging;
use romi_runner::{Bot, LoggingConsumer, Relay};
use tracing::{error, info, warn};

use romi_cli::Cli;
use romi_cli::console;
use romi_cli::discord::{self, DiscordGateway, DiscordRelay};

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging("romi", cli.log_file).context("Failed to initialize logging")?;

    let mut config = BotConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    cli.apply(&mut config);

    if !cli.simulate {
        bail!(
            "no game protocol backend is built into this binary; run with --simulate, \
             or embed romi-runner with your own Connector"
        );
    }

    info!("Starting romi as {}", config.session);
    let server = SimServer::demo(config.sort.region);
    info!(
        "Simulated world: source chest at {}, destination chest at {}",
        config.sort.region.from, config.sort.region.to
    );

    let remote = config
        .remote
        .as_ref()
        .and_then(|remote| match discord::channel_id(remote) {
            Some(channel_id) => Some((remote.token.clone(), channel_id)),
            None => {
                warn!("DISCORD_CHANNEL_ID must be non-zero - remote relay disabled");
                None
            }
        });

    let relay = match &remote {
        Some((token, channel_id)) => Relay::new(Arc::new(DiscordRelay::new(token, *channel_id))),
        None => Relay::disabled(),
    };

    let bot = Bot::new(config, Arc::new(server.connector()), relay);
    let handle = bot.handle();
    bot.event_bus().spawn_consumer(LoggingConsumer);

    let gateway = match remote {
        Some((token, channel_id)) => {
            match DiscordGateway::start(&token, channel_id, handle.clone()).await {
                Ok(gateway) => Some(gateway),
                Err(e) => {
                    error!("Failed to start Discord client: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    console::spawn_reader(handle.clone()).context("Failed to start console reader")?;

    let mut bot_task = tokio::spawn(bot.run());
    // A failed signal listener disables that branch; the bot keeps running
    tokio::select! {
        Ok(()) = shutdown_signal() => {
            info!("Received shutdown signal");
            handle.shutdown();
            bot_task.await.context("Bot task failed")?;
        }
        result = &mut bot_task => result.context("Bot task failed")?,
    }

    if let Some(gateway) = gateway {
        gateway.shutdown().await;
    }

    info!("Goodbye");
    Ok(())
}
