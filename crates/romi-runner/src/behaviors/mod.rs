//! Periodic behaviors driven by the scheduler.
//!
//! Each behavior remembers whether it is enabled separately from whether its
//! timer is armed: timers only run while a session is live, and the bot
//! re-arms enabled behaviors after every reconnect.

mod anti_idle;
mod repeater;
mod sort;

pub use anti_idle::{AntiIdle, JUMP_HOLD, random_orientation};
pub use repeater::{REPEAT_INTERVAL, Repeater};
pub use sort::{SortBehavior, SortError, SortPipeline, SortReport, SortStart, SortTiming};

use std::time::Duration;

use crate::bot::TaskAction;
use crate::scheduler::{TaskId, TaskScheduler};

/// Enabled flag plus the (at most one) repeating task behind it
#[derive(Debug)]
pub struct PeriodicTask {
    interval: Duration,
    action: TaskAction,
    enabled: bool,
    task: Option<TaskId>,
}

impl PeriodicTask {
    pub fn new(interval: Duration, action: TaskAction) -> Self {
        Self {
            interval,
            action,
            enabled: false,
            task: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_armed(&self) -> bool {
        self.task.is_some()
    }

    pub fn task_id(&self) -> Option<TaskId> {
        self.task
    }

    /// Enable, arming immediately when a session is live.
    ///
    /// Enabling twice replaces the task rather than adding a second one.
    pub fn enable(&mut self, scheduler: &mut TaskScheduler<TaskAction>, connected: bool) {
        self.enabled = true;
        self.disarm(scheduler);
        if connected {
            self.arm(scheduler);
        }
    }

    /// Returns false if the behavior was not enabled
    pub fn disable(&mut self, scheduler: &mut TaskScheduler<TaskAction>) -> bool {
        self.disarm(scheduler);
        std::mem::replace(&mut self.enabled, false)
    }

    /// Start the timer if enabled
    pub fn rearm(&mut self, scheduler: &mut TaskScheduler<TaskAction>) {
        if self.enabled {
            self.disarm(scheduler);
            self.arm(scheduler);
        }
    }

    fn arm(&mut self, scheduler: &mut TaskScheduler<TaskAction>) {
        self.task = Some(scheduler.schedule(self.interval, self.action));
    }

    /// Stop the timer, keeping the enabled flag
    pub fn disarm(&mut self, scheduler: &mut TaskScheduler<TaskAction>) {
        if let Some(id) = self.task.take() {
            scheduler.cancel(id);
        }
    }
}
