use std::time::Duration;

use romi_client::{GameSession, SessionError};
use tracing::debug;

use super::PeriodicTask;
use crate::bot::TaskAction;
use crate::scheduler::TaskScheduler;

pub const REPEAT_INTERVAL: Duration = Duration::from_millis(6000);

/// Says the same chat line over and over
#[derive(Debug)]
pub struct Repeater {
    periodic: PeriodicTask,
    message: Option<String>,
}

impl Default for Repeater {
    fn default() -> Self {
        Self::new(REPEAT_INTERVAL)
    }
}

impl Repeater {
    pub fn new(interval: Duration) -> Self {
        Self {
            periodic: PeriodicTask::new(interval, TaskAction::Repeat),
            message: None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_armed(&self) -> bool {
        self.periodic.is_armed()
    }

    /// Replace the message; the previous task is cancelled first
    pub fn enable(
        &mut self,
        message: String,
        scheduler: &mut TaskScheduler<TaskAction>,
        connected: bool,
    ) {
        self.message = Some(message);
        self.periodic.enable(scheduler, connected);
    }

    pub fn disable(&mut self, scheduler: &mut TaskScheduler<TaskAction>) -> bool {
        self.message = None;
        self.periodic.disable(scheduler)
    }

    pub fn on_connected(&mut self, scheduler: &mut TaskScheduler<TaskAction>) {
        self.periodic.rearm(scheduler);
    }

    pub fn on_disconnected(&mut self, scheduler: &mut TaskScheduler<TaskAction>) {
        self.periodic.disarm(scheduler);
    }

    pub fn tick(&self, session: Option<&dyn GameSession>) -> Result<(), SessionError> {
        match (session, &self.message) {
            (Some(session), Some(message)) => session.chat(message),
            _ => {
                debug!(target: "behavior", "Repeat tick without a live session, skipping");
                Ok(())
            }
        }
    }
}
