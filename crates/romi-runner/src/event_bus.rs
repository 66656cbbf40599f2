// Event bus owned by the runner; front-ends and tests subscribe to it

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use romi_events::{BotEvent, EventConsumer, EventEnvelope};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

/// Central event bus that stamps and distributes [`BotEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish an event; dropped silently when nobody listens
    pub fn publish(&self, event: BotEvent) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let _ = self.sender.send(EventEnvelope::new(event, sequence));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Drive a consumer from its own task until the bus closes
    pub fn spawn_consumer<C: EventConsumer>(&self, mut consumer: C) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) => consumer.handle_event(envelope),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(target: "events", "Event consumer lagged, skipped {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Consumer that logs every lifecycle event
pub struct LoggingConsumer;

impl EventConsumer for LoggingConsumer {
    fn handle_event(&mut self, envelope: EventEnvelope) {
        match envelope.event {
            BotEvent::StateChanged { from, to } => {
                tracing::debug!(target: "events", "Session {} -> {}", from, to);
            }
            event => {
                tracing::trace!(target: "events", "#{} {:?}", envelope.sequence, event);
            }
        }
    }
}
