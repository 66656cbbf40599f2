use serde::{Deserialize, Serialize};
use std::fmt;

/// Events emitted by a live game session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A chat line was received; `sender` is `None` for server/system messages
    Chat {
        sender: Option<String>,
        message: String,
    },
    /// The server kicked us
    Kicked { reason: String },
    /// The transport closed
    Disconnected { reason: Option<String> },
    /// A protocol-level error; the session may or may not survive it
    Error { message: String },
}

/// Session controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Shutdown,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Connecting => "Connecting",
            SessionState::Connected => "Connected",
            SessionState::Reconnecting => "Reconnecting",
            SessionState::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Snapshot of the controller's state, published on every transition
///
/// `generation` increments on every connect attempt, so a holder of an old
/// handle can tell it has been superseded even if the state is `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub generation: u64,
}

impl SessionStatus {
    pub fn new(state: SessionState, generation: u64) -> Self {
        Self { state, generation }
    }

    /// True if the handle from `generation` is still the live one
    pub fn is_live_for(&self, generation: u64) -> bool {
        self.state == SessionState::Connected && self.generation == generation
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::new(SessionState::Disconnected, 0)
    }
}
