/// Errors from calls into the game session
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("connection failed: {0}")]
    ConnectFailed(String),
    #[error("session is closed")]
    Closed,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("operation rejected: {0}")]
    Rejected(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}
