use std::f32::consts::{FRAC_PI_2, TAU};
use std::time::Duration;

use rand::Rng;
use romi_client::{GameSession, SessionError};
use romi_events::Control;
use tracing::{debug, info};

use super::PeriodicTask;
use crate::bot::TaskAction;
use crate::scheduler::{TaskId, TaskScheduler};

/// How long the jump key stays pressed
pub const JUMP_HOLD: Duration = Duration::from_millis(500);

/// Yaw uniform in [0, 2π), pitch uniform in [-π/2, π/2]
pub fn random_orientation<R: Rng + ?Sized>(rng: &mut R) -> (f32, f32) {
    let yaw = rng.gen_range(0.0..TAU);
    let pitch = rng.gen_range(-FRAC_PI_2..=FRAC_PI_2);
    (yaw, pitch)
}

/// Jumps and looks around so the server does not kick us for idling
#[derive(Debug)]
pub struct AntiIdle {
    periodic: PeriodicTask,
    jump_release: Option<TaskId>,
}

impl AntiIdle {
    pub fn new(interval: Duration) -> Self {
        Self {
            periodic: PeriodicTask::new(interval, TaskAction::AntiIdle),
            jump_release: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.periodic.is_enabled()
    }

    pub fn is_armed(&self) -> bool {
        self.periodic.is_armed()
    }

    pub fn enable(&mut self, scheduler: &mut TaskScheduler<TaskAction>, connected: bool) {
        self.periodic.enable(scheduler, connected);
    }

    pub fn disable(&mut self, scheduler: &mut TaskScheduler<TaskAction>) -> bool {
        self.cancel_release(scheduler);
        self.periodic.disable(scheduler)
    }

    pub fn on_connected(&mut self, scheduler: &mut TaskScheduler<TaskAction>) {
        self.periodic.rearm(scheduler);
    }

    pub fn on_disconnected(&mut self, scheduler: &mut TaskScheduler<TaskAction>) {
        self.periodic.disarm(scheduler);
        self.cancel_release(scheduler);
    }

    fn cancel_release(&mut self, scheduler: &mut TaskScheduler<TaskAction>) {
        if let Some(id) = self.jump_release.take() {
            scheduler.cancel(id);
        }
    }

    /// Press jump, schedule its release and look somewhere random
    pub fn tick(
        &mut self,
        session: Option<&dyn GameSession>,
        scheduler: &mut TaskScheduler<TaskAction>,
    ) -> Result<(), SessionError> {
        let Some(session) = session else {
            debug!(target: "behavior", "Anti-AFK tick without a live session, skipping");
            return Ok(());
        };

        session.set_control_state(Control::Jump, true)?;
        self.cancel_release(scheduler);
        self.jump_release = Some(scheduler.schedule_once(JUMP_HOLD, TaskAction::ReleaseJump));

        let (yaw, pitch) = random_orientation(&mut rand::thread_rng());
        session.look(yaw, pitch)?;

        info!(target: "behavior", "Anti-AFK: Jumped and rotated");
        Ok(())
    }

    pub fn release_jump(&mut self, session: Option<&dyn GameSession>) -> Result<(), SessionError> {
        self.jump_release = None;
        match session {
            Some(session) => session.set_control_state(Control::Jump, false),
            None => Ok(()),
        }
    }
}
