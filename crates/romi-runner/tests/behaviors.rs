mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{FROM, Running, TO, config};
use romi_client::sim::SimServer;
use romi_events::{Behavior, BotEvent, Control, Vitals};
use romi_runner::{Relay, RelayError, RemoteChannel};
use tokio::time;

fn jumps(server: &SimServer) -> usize {
    server
        .control_log()
        .iter()
        .filter(|(control, active)| *control == Control::Jump && *active)
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_anti_idle_jumps_and_looks_every_interval() {
    let mut bot = Running::start(SimServer::new(), config());
    bot.connected().await;

    bot.say("Steve", "!afk on").await;
    assert_eq!(bot.server.chat_log(), vec!["AFK Mode Enabled".to_string()]);
    assert!(bot.server.looks().is_empty());

    time::sleep(Duration::from_millis(20_000)).await;
    assert_eq!(jumps(&bot.server), 1);
    assert_eq!(bot.server.looks().len(), 1);

    // Jump released half a second later
    time::sleep(Duration::from_millis(600)).await;
    assert_eq!(
        bot.server.control_log().last(),
        Some(&(Control::Jump, false))
    );

    time::sleep(Duration::from_millis(40_000)).await;
    assert_eq!(bot.server.looks().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_enabling_twice_yields_one_task() {
    let mut bot = Running::start(SimServer::new(), config());
    bot.connected().await;

    bot.say("Steve", "!afk on").await;
    bot.say("Steve", "!afk on").await;

    time::sleep(Duration::from_millis(60_500)).await;
    assert_eq!(bot.server.looks().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_disable_stops_firings() {
    let mut bot = Running::start(SimServer::new(), config());
    bot.connected().await;

    bot.say("Steve", "!afk on").await;
    time::sleep(Duration::from_millis(20_500)).await;
    assert_eq!(bot.server.looks().len(), 1);

    bot.say("Steve", "!afk off").await;
    assert_eq!(
        bot.server.chat_log().last().map(String::as_str),
        Some("AFK Mode Disabled")
    );
    time::sleep(Duration::from_secs(120)).await;
    assert_eq!(bot.server.looks().len(), 1);

    // Disabling again is harmless
    bot.say("Steve", "!afk off").await;
    time::sleep(Duration::from_secs(30)).await;
    assert_eq!(bot.server.looks().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_behavior_runs_between_disconnect_and_reconnect() {
    let mut bot = Running::start(SimServer::new(), config());
    bot.connected().await;

    bot.say("Steve", "!afk on").await;
    bot.say("Steve", "!repeat on come visit").await;
    time::sleep(Duration::from_millis(19_000)).await;
    let chat_before = bot.server.chat_log().len();

    bot.server.kick("server restarting");
    bot.wait_for(|e| matches!(e, BotEvent::Disconnected { .. }))
        .await;
    assert_eq!(bot.server.live_sessions(), 0);

    // Both timers would have fired during the 10 s backoff
    time::sleep(Duration::from_millis(9_000)).await;
    assert!(bot.server.looks().is_empty());
    assert_eq!(bot.server.chat_log().len(), chat_before);

    // Re-armed after reconnect
    bot.connected().await;
    time::sleep(Duration::from_millis(20_500)).await;
    assert_eq!(bot.server.looks().len(), 1);
    assert!(bot.server.chat_log().len() > chat_before);
}

#[tokio::test(start_paused = true)]
async fn test_behavior_enabled_offline_arms_on_connect() {
    let server = SimServer::new();
    server.set_connect_delay(Duration::from_secs(5));
    let mut bot = Running::start(server, config());
    common::settle().await;

    // Console has no afk verb; toggles only come from game chat, so inject one
    assert!(bot.handle.send(romi_events::InboundMessage::game_chat(
        Some("Steve".to_string()),
        "!afk on"
    )));
    common::settle().await;
    assert_eq!(
        bot.wait_for(|e| matches!(e, BotEvent::BehaviorToggled { .. }))
            .await,
        BotEvent::BehaviorToggled {
            behavior: Behavior::AntiIdle,
            enabled: true
        }
    );

    bot.connected().await;
    time::sleep(Duration::from_millis(20_500)).await;
    assert_eq!(bot.server.looks().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeat_replaces_message() {
    let mut bot = Running::start(SimServer::new(), config());
    bot.connected().await;

    bot.say("Steve", "!repeat on first").await;
    bot.say("Steve", "!repeat on second line").await;
    time::sleep(Duration::from_millis(12_500)).await;

    let log = bot.server.chat_log();
    assert_eq!(log[0], "Repeat enabled: \"first\"");
    assert_eq!(log[1], "Repeat enabled: \"second line\"");
    assert_eq!(&log[2..], ["second line", "second line"]);

    bot.say("Steve", "!repeat off").await;
    time::sleep(Duration::from_secs(60)).await;
    assert_eq!(bot.server.chat_log().len(), 5);
    assert_eq!(bot.server.chat_log()[4], "Repeat disabled!");
}

#[tokio::test(start_paused = true)]
async fn test_repeat_usage_reply() {
    let mut bot = Running::start(SimServer::new(), config());
    bot.connected().await;

    bot.say("Steve", "!repeat on").await;
    assert_eq!(
        bot.server.chat_log(),
        vec!["Usage: !repeat on <message> or !repeat off".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_own_chat_is_not_a_command() {
    let mut bot = Running::start(SimServer::new(), config());
    bot.connected().await;

    bot.say("Romi", "!afk on").await;
    assert!(bot.server.chat_log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_status_and_show_address() {
    let server = SimServer::new();
    server.set_vitals(Vitals {
        health: 17.5,
        food: 12,
    });
    let mut bot = Running::start(server, config());
    bot.connected().await;

    bot.say("Steve", "!status").await;
    bot.say("Steve", "!show-address").await;
    bot.say("Steve", "!dance").await;
    assert_eq!(
        bot.server.chat_log(),
        vec![
            "Health: 17/20, Food: 12/20".to_string(),
            "Current Server: localhost:25565".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_sort_on_runs_immediately_and_on_schedule() {
    let server = SimServer::new()
        .with_container(
            FROM,
            &[
                ("arrow", 1),
                ("bone", 1),
                ("arrow", 1),
                ("string", 4),
                ("arrow", 1),
                ("bone", 1),
            ],
        )
        .with_container(TO, &[]);
    let mut bot = Running::start(server, config());
    bot.connected().await;

    bot.say("Steve", "!sort on").await;
    assert_eq!(bot.server.chat_log(), vec!["Chest sorting enabled!".to_string()]);
    assert_eq!(
        bot.wait_for(|e| matches!(e, BotEvent::SortFinished { .. }))
            .await,
        BotEvent::SortFinished { success: true }
    );

    assert_eq!(bot.server.count_in(FROM, "arrow"), 0);
    assert_eq!(bot.server.count_in(FROM, "bone"), 0);
    assert_eq!(bot.server.count_in(FROM, "string"), 4);
    assert_eq!(bot.server.tossed().len(), 3);
    assert_eq!(bot.server.count_in(TO, "bone"), 2);
    assert!(bot.server.inventory().is_empty());

    // Next scheduled run finds nothing to do
    bot.wait_for(|e| matches!(e, BotEvent::SortFinished { .. }))
        .await;
    assert_eq!(bot.server.goals(), vec![FROM, TO, FROM]);

    bot.say("Steve", "!sort off").await;
    assert_eq!(
        bot.server.chat_log().last().map(String::as_str),
        Some("Chest sorting disabled!")
    );
}

#[tokio::test(start_paused = true)]
async fn test_sort_tick_while_busy_is_skipped() {
    let server = SimServer::new()
        .with_container(FROM, &[("bone", 1)])
        .with_container(TO, &[]);
    server.mark_unreachable(FROM);
    let mut cfg = config();
    cfg.sort.interval_ms = 7_000;
    let mut bot = Running::start(server, cfg);
    bot.connected().await;

    bot.say("Steve", "!sort on").await;
    // The first run is stuck navigating for a minute; ticks in between are skipped
    assert_eq!(
        bot.wait_for(|e| matches!(e, BotEvent::SortFinished { .. }))
            .await,
        BotEvent::SortFinished { success: false }
    );
    assert_eq!(bot.server.goals(), vec![FROM]);
}

#[derive(Default)]
struct Recording {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl RemoteChannel for Recording {
    async fn send(&self, text: &str) -> Result<(), RelayError> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_game_chat_mirrors_to_remote() {
    let remote = Arc::new(Recording::default());
    let mut bot = Running::start_with(SimServer::new(), config(), Relay::new(remote.clone()));
    bot.connected().await;

    bot.say("Steve", "hello world").await;
    bot.say("Steve", "!help").await;
    common::settle().await;

    assert_eq!(
        *remote.sent.lock().unwrap(),
        vec![
            "[MC] <Steve> hello world".to_string(),
            "[MC] <Steve> !help".to_string()
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_remote_messages_forwarding_rules() {
    let remote = Arc::new(Recording::default());
    let mut bot = Running::start_with(SimServer::new(), config(), Relay::new(remote.clone()));
    bot.connected().await;

    bot.handle.remote_message("alice", "hi from discord", false);
    bot.handle.remote_message("webhook", "automated", true);
    bot.handle.remote_message("alice", "[MC] <Steve> echo", false);
    common::settle().await;

    assert_eq!(bot.server.chat_log(), vec!["hi from discord".to_string()]);
    // Console replies never reach the remote channel
    bot.console("status").await;
    assert!(remote.sent.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_remote_message_dropped_while_offline() {
    let server = SimServer::new();
    server.fail_next_connects(1);
    let mut bot = Running::start(server, config());
    bot.wait_for(|e| matches!(e, BotEvent::ReconnectScheduled { .. }))
        .await;

    bot.handle.remote_message("alice", "anyone there?", false);
    common::settle().await;

    bot.connected().await;
    time::sleep(Duration::from_secs(1)).await;
    assert!(bot.server.chat_log().is_empty());
}
