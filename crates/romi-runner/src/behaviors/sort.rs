//! Chest sorting: discard junk from the source container and carry the
//! transfer item over to the destination container.

use std::sync::Arc;
use std::time::Duration;

use romi_client::config::{SortConfig, SortRegion};
use romi_client::{Container, SessionError, SessionHandle};
use romi_events::{BlockPos, BotEvent, ItemStack};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use super::PeriodicTask;
use crate::bot::TaskAction;
use crate::controller::LiveSession;
use crate::event_bus::EventBus;
use crate::scheduler::TaskScheduler;

/// Errors that abort a single sort run
#[derive(Debug, Error)]
pub enum SortError {
    #[error("session is no longer live")]
    SessionLost,

    #[error("could not reach {target} within {waited:?}")]
    NavigationTimeout { target: BlockPos, waited: Duration },

    #[error("movement rejected: {0}")]
    Movement(#[source] SessionError),

    #[error("no container at {0}")]
    NoContainer(BlockPos),

    #[error("failed to open container at {pos}: {source}")]
    OpenFailed {
        pos: BlockPos,
        #[source]
        source: SessionError,
    },

    #[error("failed to move {item}: {source}")]
    Transfer {
        item: String,
        #[source]
        source: SessionError,
    },
}

/// Pacing of the pipeline steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortTiming {
    /// Between arrival checks while navigating
    pub poll: Duration,
    /// After arriving somewhere, and before heading to the destination
    pub settle: Duration,
    /// After withdrawing an item that will be tossed
    pub pick: Duration,
    /// After tossing an item
    pub toss: Duration,
    /// Between transfer withdrawals and deposits
    pub transfer: Duration,
    pub navigation_timeout: Duration,
}

impl Default for SortTiming {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(500),
            settle: Duration::from_millis(500),
            pick: Duration::from_millis(100),
            toss: Duration::from_millis(200),
            transfer: Duration::from_millis(200),
            navigation_timeout: Duration::from_millis(60_000),
        }
    }
}

/// Counts from a finished run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SortReport {
    pub discarded: u32,
    pub transferred: u32,
}

/// One pass over the sort region
#[derive(Debug, Clone)]
pub struct SortPipeline {
    region: SortRegion,
    discard_item: String,
    transfer_item: String,
    timing: SortTiming,
    /// Arrival distance in blocks
    tolerance: f64,
}

impl SortPipeline {
    pub fn new(config: &SortConfig) -> Self {
        Self {
            region: config.region,
            discard_item: config.discard_item.clone(),
            transfer_item: config.transfer_item.clone(),
            timing: SortTiming {
                navigation_timeout: Duration::from_millis(config.navigation_timeout_ms),
                ..SortTiming::default()
            },
            tolerance: 2.0,
        }
    }

    pub fn with_timing(mut self, timing: SortTiming) -> Self {
        self.timing = timing;
        self
    }

    pub async fn run(&self, live: &LiveSession) -> Result<SortReport, SortError> {
        let mut report = SortReport::default();

        self.navigate(live, self.region.from).await?;
        let mut source = self.open(live, self.region.from).await?;

        // Stacks left over from an earlier run that never reached the destination
        let leftover: Vec<ItemStack> = ensure_live(live)?
            .inventory()
            .into_iter()
            .filter(|i| i.name == self.transfer_item)
            .collect();
        if !leftover.is_empty() {
            debug!(
                target: "sort",
                "Carrying {} leftover {} stacks",
                leftover.len(),
                self.transfer_item
            );
        }

        let items = source.items();
        let discards: Vec<ItemStack> = items
            .iter()
            .filter(|i| i.name == self.discard_item)
            .cloned()
            .collect();
        let has_transfers =
            !leftover.is_empty() || items.iter().any(|i| i.name == self.transfer_item);

        if discards.is_empty() && !has_transfers {
            info!(
                target: "sort",
                "No {} or {} found in source chest",
                self.discard_item, self.transfer_item
            );
            source.close().await;
            return Ok(report);
        }

        let withdrawn = self
            .empty_source(live, source.as_mut(), &discards, &mut report)
            .await;
        source.close().await;
        let mut carried = leftover;
        carried.extend(withdrawn?);

        if carried.is_empty() {
            return Ok(report);
        }

        time::sleep(self.timing.settle).await;
        self.navigate(live, self.region.to).await?;
        let mut destination = self.open(live, self.region.to).await?;

        let deposited = self
            .fill_destination(live, destination.as_mut(), &carried, &mut report)
            .await;
        destination.close().await;
        deposited?;

        Ok(report)
    }

    /// Toss discards, then withdraw every transfer stack into the inventory
    async fn empty_source(
        &self,
        live: &LiveSession,
        source: &mut dyn Container,
        discards: &[ItemStack],
        report: &mut SortReport,
    ) -> Result<Vec<ItemStack>, SortError> {
        for item in discards {
            ensure_live(live)?;
            let held = source
                .withdraw(item)
                .await
                .map_err(|e| transfer_error(item, e))?;
            time::sleep(self.timing.pick).await;

            ensure_live(live)?
                .toss(&held)
                .await
                .map_err(|e| transfer_error(&held, e))?;
            report.discarded += held.count;
            debug!(target: "sort", "Tossed {} x{}", held.name, held.count);
            time::sleep(self.timing.toss).await;
        }

        // Slots may have shifted while discarding
        let transfers: Vec<ItemStack> = source
            .items()
            .into_iter()
            .filter(|i| i.name == self.transfer_item)
            .collect();

        let mut carried = Vec::with_capacity(transfers.len());
        for item in &transfers {
            ensure_live(live)?;
            let held = source
                .withdraw(item)
                .await
                .map_err(|e| transfer_error(item, e))?;
            carried.push(held);
            time::sleep(self.timing.transfer).await;
        }

        Ok(carried)
    }

    async fn fill_destination(
        &self,
        live: &LiveSession,
        destination: &mut dyn Container,
        carried: &[ItemStack],
        report: &mut SortReport,
    ) -> Result<(), SortError> {
        for item in carried {
            ensure_live(live)?;
            destination
                .deposit(item)
                .await
                .map_err(|e| transfer_error(item, e))?;
            report.transferred += item.count;
            time::sleep(self.timing.transfer).await;
        }
        Ok(())
    }

    /// Walk to within `tolerance` of `target`, then settle
    async fn navigate(&self, live: &LiveSession, target: BlockPos) -> Result<(), SortError> {
        ensure_live(live)?
            .set_goal(target, self.tolerance)
            .map_err(SortError::Movement)?;

        let destination = target.center();
        let started = Instant::now();
        let mut poll = time::interval_at(started + self.timing.poll, self.timing.poll);

        loop {
            poll.tick().await;
            let session = ensure_live(live)?;
            if let Some(position) = session.position()
                && position.distance_to(destination) < self.tolerance
            {
                break;
            }
            if started.elapsed() >= self.timing.navigation_timeout {
                session.clear_goal();
                return Err(SortError::NavigationTimeout {
                    target,
                    waited: started.elapsed(),
                });
            }
        }

        debug!(target: "sort", "Arrived at {}", target);
        time::sleep(self.timing.settle).await;
        Ok(())
    }

    async fn open(
        &self,
        live: &LiveSession,
        pos: BlockPos,
    ) -> Result<Box<dyn Container>, SortError> {
        let session = ensure_live(live)?;
        match session.block_at(pos) {
            Some(block) if block.is_container() => {}
            _ => return Err(SortError::NoContainer(pos)),
        }
        session
            .open_container(pos)
            .await
            .map_err(|source| SortError::OpenFailed { pos, source })
    }
}

fn ensure_live(live: &LiveSession) -> Result<&SessionHandle, SortError> {
    live.get().ok_or(SortError::SessionLost)
}

fn transfer_error(item: &ItemStack, source: SessionError) -> SortError {
    SortError::Transfer {
        item: item.name.clone(),
        source,
    }
}

/// Outcome of a sort tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortStart {
    Started,
    Busy,
    NotConnected,
}

/// The periodic sort: timer bookkeeping plus the in-progress run
pub struct SortBehavior {
    periodic: PeriodicTask,
    pipeline: Arc<SortPipeline>,
    run: Option<JoinHandle<()>>,
}

impl SortBehavior {
    pub fn new(config: &SortConfig) -> Self {
        Self::with_pipeline(
            Duration::from_millis(config.interval_ms),
            SortPipeline::new(config),
        )
    }

    pub fn with_pipeline(interval: Duration, pipeline: SortPipeline) -> Self {
        Self {
            periodic: PeriodicTask::new(interval, TaskAction::Sort),
            pipeline: Arc::new(pipeline),
            run: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.periodic.is_enabled()
    }

    pub fn is_armed(&self) -> bool {
        self.periodic.is_armed()
    }

    pub fn is_running(&self) -> bool {
        self.run.as_ref().is_some_and(|run| !run.is_finished())
    }

    pub fn enable(&mut self, scheduler: &mut TaskScheduler<TaskAction>, connected: bool) {
        self.periodic.enable(scheduler, connected);
    }

    /// Stops future runs; a run already in progress finishes on its own
    pub fn disable(&mut self, scheduler: &mut TaskScheduler<TaskAction>) -> bool {
        self.periodic.disable(scheduler)
    }

    pub fn on_connected(&mut self, scheduler: &mut TaskScheduler<TaskAction>) {
        self.periodic.rearm(scheduler);
    }

    pub fn on_disconnected(&mut self, scheduler: &mut TaskScheduler<TaskAction>) {
        self.periodic.disarm(scheduler);
    }

    /// Start a run in the background unless one is already going
    pub fn start(&mut self, live: Option<LiveSession>, events: &EventBus) -> SortStart {
        if self.is_running() {
            warn!(target: "sort", "Previous sort still running, skipping this tick");
            return SortStart::Busy;
        }
        let Some(live) = live else {
            debug!(target: "sort", "Sort tick without a live session, skipping");
            return SortStart::NotConnected;
        };

        let pipeline = Arc::clone(&self.pipeline);
        let events = events.clone();
        self.run = Some(tokio::spawn(async move {
            info!(target: "sort", "Starting chest sorting...");
            match pipeline.run(&live).await {
                Ok(report) => {
                    info!(
                        target: "sort",
                        "Chest sorting complete: {} discarded, {} transferred",
                        report.discarded, report.transferred
                    );
                    events.publish(BotEvent::SortFinished { success: true });
                }
                Err(e) => {
                    error!(target: "sort", "Chest sorting error: {}", e);
                    events.publish(BotEvent::SortFinished { success: false });
                }
            }
        }));
        SortStart::Started
    }

    pub fn abort(&mut self) {
        if let Some(run) = self.run.take() {
            run.abort();
        }
    }
}
