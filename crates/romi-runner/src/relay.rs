//! Chat relay between the game and a remote messaging channel.

use std::sync::Arc;

use async_trait::async_trait;
use romi_events::{ChatSource, InboundMessage};
use thiserror::Error;
use tracing::debug;

/// Marker on every line mirrored out of the game
pub const RELAY_PREFIX: &str = "[MC] ";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("remote send failed: {0}")]
    Send(String),

    #[error("remote channel is not ready")]
    NotReady,
}

/// The remote messaging platform
#[async_trait]
pub trait RemoteChannel: Send + Sync + 'static {
    async fn send(&self, text: &str) -> Result<(), RelayError>;
}

/// Line sent to the remote channel for a game chat message
pub fn mirror_text(sender: Option<&str>, message: &str) -> String {
    match sender {
        Some(sender) => format!("{}<{}> {}", RELAY_PREFIX, sender, message),
        None => format!("{}{}", RELAY_PREFIX, message),
    }
}

/// Whether a remote message should be forwarded into game chat.
///
/// Automated senders (including our own relay user) and anything carrying
/// the relay marker are dropped so mirrored lines never loop back.
pub fn should_forward(message: &InboundMessage) -> bool {
    message.source == ChatSource::RemoteChannel
        && !message.automated
        && !message.text.trim_start().starts_with(RELAY_PREFIX.trim_end())
        && !message.text.trim().is_empty()
}

/// Optional remote side of the relay
#[derive(Clone, Default)]
pub struct Relay {
    channel: Option<Arc<dyn RemoteChannel>>,
}

impl Relay {
    pub fn new(channel: Arc<dyn RemoteChannel>) -> Self {
        Self {
            channel: Some(channel),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.channel.is_some()
    }

    /// Mirror a game chat line; failures are logged and dropped
    pub fn mirror(&self, sender: Option<&str>, message: &str) {
        let Some(channel) = &self.channel else {
            return;
        };
        let channel = Arc::clone(channel);
        let text = mirror_text(sender, message);
        tokio::spawn(async move {
            if let Err(e) = channel.send(&text).await {
                debug!(target: "relay", "Dropped mirrored message: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl RemoteChannel for Recording {
        async fn send(&self, text: &str) -> Result<(), RelayError> {
            if self.fail {
                return Err(RelayError::Send("rate limited".to_string()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_mirror_text() {
        assert_eq!(mirror_text(Some("Steve"), "hi"), "[MC] <Steve> hi");
        assert_eq!(mirror_text(None, "Steve joined the game"), "[MC] Steve joined the game");
    }

    #[test]
    fn test_forward_filter() {
        assert!(should_forward(&InboundMessage::remote("alice", "hello", false)));
        assert!(!should_forward(&InboundMessage::remote("bot", "hello", true)));
        assert!(!should_forward(&InboundMessage::remote("alice", "[MC] <Steve> hi", false)));
        assert!(!should_forward(&InboundMessage::remote("alice", "[MC]", false)));
        assert!(!should_forward(&InboundMessage::remote("alice", "  ", false)));
        assert!(!should_forward(&InboundMessage::console("hello")));
    }

    #[tokio::test]
    async fn test_mirror_sends_in_background() {
        let channel = Arc::new(Recording::default());
        let relay = Relay::new(channel.clone());

        relay.mirror(Some("Steve"), "hi");
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(*channel.sent.lock().unwrap(), vec!["[MC] <Steve> hi".to_string()]);
    }

    #[tokio::test]
    async fn test_send_failure_is_swallowed() {
        let channel = Arc::new(Recording {
            fail: true,
            ..Recording::default()
        });
        let relay = Relay::new(channel.clone());
        relay.mirror(None, "hi");
        tokio::task::yield_now().await;
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_disabled_relay() {
        assert!(!Relay::disabled().is_enabled());
        Relay::disabled().mirror(Some("Steve"), "hi");
    }
}
