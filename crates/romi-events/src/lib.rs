/// Core event types for romi
///
/// This crate holds the value types that flow between the session client,
/// the runner and the front-ends, so none of them depend on each other.
mod messages;
mod session_events;
mod world;

pub use messages::{ChatSource, InboundMessage};
pub use session_events::{SessionEvent, SessionState, SessionStatus};
pub use world::{Block, BlockPos, Control, ItemStack, Vec3, Vitals};

use std::fmt;
use std::time::Instant;

// ============================================================================
// Behaviors
// ============================================================================

/// The independently toggleable periodic routines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Behavior {
    AntiIdle,
    Sort,
    Repeat,
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Behavior::AntiIdle => write!(f, "anti-idle"),
            Behavior::Sort => write!(f, "sort"),
            Behavior::Repeat => write!(f, "repeat"),
        }
    }
}

// ============================================================================
// Bot Events
// ============================================================================

/// Lifecycle events published by the runner for observers (front-ends, tests)
#[derive(Debug, Clone, PartialEq)]
pub enum BotEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// A connect attempt was started against this address
    ConnectAttempt {
        generation: u64,
        host: String,
        port: u16,
        identity: String,
    },
    Connected {
        generation: u64,
    },
    Disconnected {
        reason: String,
    },
    ReconnectScheduled {
        delay_ms: u64,
        immediate: bool,
    },
    BehaviorToggled {
        behavior: Behavior,
        enabled: bool,
    },
    SortFinished {
        success: bool,
    },
    Shutdown,
}

/// Event with ordering metadata attached by the runner
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub event: BotEvent,
    pub sequence: u64,
    pub timestamp: Instant,
}

impl EventEnvelope {
    pub fn new(event: BotEvent, sequence: u64) -> Self {
        Self {
            event,
            sequence,
            timestamp: Instant::now(),
        }
    }
}

// ============================================================================
// Event Consumer Trait
// ============================================================================

/// Trait for consuming bot events - front-ends implement this to observe the runner
pub trait EventConsumer: Send + 'static {
    /// Handle an event envelope
    fn handle_event(&mut self, envelope: EventEnvelope);
}
