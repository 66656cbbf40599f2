use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::trace;

/// Unique identifier for a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// Type of task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
    /// Fires once and is removed when the firing is accepted
    OneShot,
    /// Fires repeatedly until cancelled
    Repeating,
}

struct Task {
    kind: TaskKind,
    timer: JoinHandle<()>,
}

/// A timer firing, delivered to the event loop
#[derive(Debug)]
pub struct Fired<A> {
    pub id: TaskId,
    pub action: A,
}

/// Repeating and one-shot timers feeding a single event loop.
///
/// Each task is a tokio timer that sends its action down the fire channel.
/// The loop hands every firing back through [`TaskScheduler::accept`], which
/// drops firings for tasks cancelled after the firing was queued, so a
/// cancelled task never runs its action.
pub struct TaskScheduler<A> {
    tasks: HashMap<TaskId, Task>,
    next_id: u64,
    fire_tx: mpsc::UnboundedSender<Fired<A>>,
}

impl<A> TaskScheduler<A>
where
    A: Clone + Send + 'static,
{
    /// Create a scheduler and the receiver its firings arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Fired<A>>) {
        let (fire_tx, fire_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            tasks: HashMap::new(),
            next_id: 0,
            fire_tx,
        };
        (scheduler, fire_rx)
    }

    fn allocate(&mut self) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Fire `action` every `interval`, first firing one interval from now
    pub fn schedule(&mut self, interval: Duration, action: A) -> TaskId {
        let id = self.allocate();
        let interval = interval.max(Duration::from_millis(1));
        let fire_tx = self.fire_tx.clone();

        let timer = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if fire_tx
                    .send(Fired {
                        id,
                        action: action.clone(),
                    })
                    .is_err()
                {
                    break;
                }
            }
        });

        trace!(target: "scheduler", "Scheduled repeating task {:?} every {:?}", id, interval);
        self.tasks.insert(
            id,
            Task {
                kind: TaskKind::Repeating,
                timer,
            },
        );
        id
    }

    /// Fire `action` once after `delay`
    pub fn schedule_once(&mut self, delay: Duration, action: A) -> TaskId {
        let id = self.allocate();
        let fire_tx = self.fire_tx.clone();

        let timer = tokio::spawn(async move {
            time::sleep(delay).await;
            let _ = fire_tx.send(Fired { id, action });
        });

        trace!(target: "scheduler", "Scheduled one-shot task {:?} in {:?}", id, delay);
        self.tasks.insert(
            id,
            Task {
                kind: TaskKind::OneShot,
                timer,
            },
        );
        id
    }

    /// Cancel a task. Unknown or already-fired tasks are a no-op.
    ///
    /// Returns true if a task was actually cancelled.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        match self.tasks.remove(&id) {
            Some(task) => {
                task.timer.abort();
                trace!(target: "scheduler", "Cancelled task {:?}", id);
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.timer.abort();
        }
    }

    /// Resolve a firing into its action, or `None` if the task is gone
    pub fn accept(&mut self, fired: Fired<A>) -> Option<A> {
        let kind = self.tasks.get(&fired.id)?.kind;
        if kind == TaskKind::OneShot {
            self.tasks.remove(&fired.id);
        }
        Some(fired.action)
    }

    pub fn is_active(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Get the number of active tasks
    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }
}

impl<A> Drop for TaskScheduler<A> {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.timer.abort();
        }
    }
}
