mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FROM, TO};
use romi_client::SessionError;
use romi_client::config::{SessionConfig, SessionConfigUpdate, SortConfig, SortRegion};
use romi_client::sim::SimServer;
use romi_runner::behaviors::{SortError, SortPipeline, SortReport};
use romi_runner::controller::{SessionController, SessionSignal};
use romi_runner::{EventBus, LiveSession, TaskAction, TaskScheduler};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

struct Connected {
    controller: SessionController,
    scheduler: TaskScheduler<TaskAction>,
    signals: mpsc::UnboundedReceiver<SessionSignal>,
    events: EventBus,
}

impl Connected {
    async fn new(server: &SimServer) -> Self {
        let (signal_tx, mut signals) = mpsc::unbounded_channel();
        let mut controller = SessionController::new(
            SessionConfig::default(),
            Arc::new(server.connector()),
            signal_tx,
        );
        let (mut scheduler, _fired) = TaskScheduler::new();
        let events = EventBus::new(16);

        controller.connect(&events);
        let signal = signals.recv().await.unwrap();
        controller.handle_signal(signal, &mut scheduler, &events);
        assert!(controller.is_connected());

        Self {
            controller,
            scheduler,
            signals,
            events,
        }
    }

    fn live(&self) -> LiveSession {
        self.controller.live_session().unwrap()
    }

    /// Feed the next session signal (kick, disconnect) to the controller
    async fn process_signal(&mut self) {
        let signal = self.signals.recv().await.unwrap();
        self.controller
            .handle_signal(signal, &mut self.scheduler, &self.events);
    }
}

fn pipeline() -> SortPipeline {
    SortPipeline::new(&SortConfig {
        region: SortRegion { from: FROM, to: TO },
        ..SortConfig::default()
    })
}

#[tokio::test(start_paused = true)]
async fn test_discards_arrows_and_moves_bones() {
    let server = SimServer::new()
        .with_container(
            FROM,
            &[
                ("arrow", 16),
                ("arrow", 16),
                ("bone", 3),
                ("arrow", 5),
                ("bone", 2),
                ("dirt", 64),
            ],
        )
        .with_container(TO, &[("bone", 1)]);
    let session = Connected::new(&server).await;

    let report = pipeline().run(&session.live()).await.unwrap();

    assert_eq!(
        report,
        SortReport {
            discarded: 37,
            transferred: 5
        }
    );
    assert_eq!(server.count_in(FROM, "arrow"), 0);
    assert_eq!(server.count_in(FROM, "bone"), 0);
    assert_eq!(server.count_in(FROM, "dirt"), 64);
    assert_eq!(server.count_in(TO, "bone"), 6);
    assert_eq!(server.tossed().len(), 3);
    assert_eq!(server.goals(), vec![FROM, TO]);
    assert_eq!(server.opened(), vec![FROM, TO]);
    assert_eq!(server.closed(), vec![FROM, TO]);
}

#[tokio::test(start_paused = true)]
async fn test_nothing_to_sort_stays_at_source() {
    let server = SimServer::new()
        .with_container(FROM, &[("dirt", 64)])
        .with_container(TO, &[]);
    let session = Connected::new(&server).await;

    let report = pipeline().run(&session.live()).await.unwrap();

    assert_eq!(report, SortReport::default());
    assert_eq!(server.goals(), vec![FROM]);
    assert_eq!(server.opened(), vec![FROM]);
    assert_eq!(server.closed(), vec![FROM]);
}

#[tokio::test(start_paused = true)]
async fn test_only_discards_skips_destination() {
    let server = SimServer::new()
        .with_container(FROM, &[("arrow", 3)])
        .with_container(TO, &[]);
    let session = Connected::new(&server).await;

    let report = pipeline().run(&session.live()).await.unwrap();

    assert_eq!(report.discarded, 3);
    assert_eq!(server.goals(), vec![FROM]);
}

#[tokio::test(start_paused = true)]
async fn test_arrival_waits_for_poll_and_settle() {
    let server = SimServer::new()
        .with_container(FROM, &[])
        .with_container(TO, &[]);
    let session = Connected::new(&server).await;

    let start = Instant::now();
    pipeline().run(&session.live()).await.unwrap();
    // One poll interval plus the settle delay before opening
    assert!(start.elapsed() >= Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn test_navigation_timeout() {
    let server = SimServer::new().with_container(FROM, &[("bone", 1)]);
    server.mark_unreachable(FROM);
    let session = Connected::new(&server).await;

    let start = Instant::now();
    let err = pipeline().run(&session.live()).await.unwrap_err();

    assert!(matches!(err, SortError::NavigationTimeout { target, .. } if target == FROM));
    assert!(start.elapsed() >= Duration::from_millis(60_000));
    assert!(start.elapsed() < Duration::from_millis(62_000));
    assert!(server.opened().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_block_is_not_a_container() {
    let server = SimServer::new().with_block(FROM, "stone");
    let session = Connected::new(&server).await;

    let err = pipeline().run(&session.live()).await.unwrap_err();
    assert!(matches!(err, SortError::NoContainer(pos) if pos == FROM));
}

#[tokio::test(start_paused = true)]
async fn test_missing_block() {
    let server = SimServer::new();
    let session = Connected::new(&server).await;

    let err = pipeline().run(&session.live()).await.unwrap_err();
    assert!(matches!(err, SortError::NoContainer(_)));
}

#[tokio::test(start_paused = true)]
async fn test_open_failure() {
    let server = SimServer::new().with_container(FROM, &[("arrow", 1)]);
    server.lock_container(FROM);
    let session = Connected::new(&server).await;

    let err = pipeline().run(&session.live()).await.unwrap_err();
    assert!(matches!(
        err,
        SortError::OpenFailed {
            source: SessionError::Rejected(_),
            ..
        }
    ));
    assert_eq!(server.count_in(FROM, "arrow"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_destination_keeps_items_in_inventory() {
    let server = SimServer::new().with_container(FROM, &[("bone", 2)]);
    let session = Connected::new(&server).await;

    let err = pipeline().run(&session.live()).await.unwrap_err();
    assert!(matches!(err, SortError::NoContainer(pos) if pos == TO));
    assert_eq!(server.inventory().len(), 1);
    assert_eq!(server.closed(), vec![FROM]);
}

#[tokio::test(start_paused = true)]
async fn test_next_run_delivers_items_left_in_inventory() {
    let server = SimServer::new().with_container(FROM, &[("bone", 2)]);
    let session = Connected::new(&server).await;

    let err = pipeline().run(&session.live()).await.unwrap_err();
    assert!(matches!(err, SortError::NoContainer(pos) if pos == TO));
    assert_eq!(server.count_in(FROM, "bone"), 0);

    let server = server.with_container(TO, &[]);
    let report = pipeline().run(&session.live()).await.unwrap();

    assert_eq!(report.transferred, 2);
    assert_eq!(server.count_in(TO, "bone"), 2);
    assert!(server.inventory().is_empty());
    assert_eq!(server.goals(), vec![FROM, TO, FROM, TO]);
}

#[tokio::test(start_paused = true)]
async fn test_session_lost_mid_run() {
    let server = SimServer::new()
        .with_container(FROM, &[("arrow", 1), ("arrow", 1), ("arrow", 1), ("bone", 2)])
        .with_container(TO, &[]);
    let mut session = Connected::new(&server).await;
    let live = session.live();

    let run = tokio::spawn(async move { pipeline().run(&live).await });

    // Past arrival and settle, into the discard loop
    time::sleep(Duration::from_millis(1_150)).await;
    server.kick("connection reset");
    session.process_signal().await;
    assert!(!session.controller.is_connected());

    let err = run.await.unwrap().unwrap_err();
    assert!(matches!(err, SortError::SessionLost));
    assert!(server.tossed().len() < 3);
    assert_eq!(server.count_in(TO, "bone"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reconfigure_invalidates_live_session() {
    let server = SimServer::new().with_container(FROM, &[("bone", 1)]);
    let mut session = Connected::new(&server).await;
    let live = session.live();
    assert!(live.is_live());

    session.controller.update_config(
        SessionConfigUpdate::address("other.example", 25565),
        &mut session.scheduler,
        &session.events,
    );

    assert!(!live.is_live());
    let err = pipeline().run(&live).await.unwrap_err();
    assert!(matches!(err, SortError::SessionLost));
    assert!(server.goals().is_empty());
}
