use std::fmt;

/// Where an inbound line of text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatSource {
    /// In-game chat heard by the session
    GameChat,
    /// Local operator console (stdin)
    Console,
    /// Third-party messaging channel (Discord)
    RemoteChannel,
}

impl fmt::Display for ChatSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatSource::GameChat => write!(f, "game"),
            ChatSource::Console => write!(f, "console"),
            ChatSource::RemoteChannel => write!(f, "remote"),
        }
    }
}

/// A single inbound message, tagged by source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub source: ChatSource,
    /// Display name of the sender, when the source knows it
    pub author: Option<String>,
    pub text: String,
    /// Sent by an automated account (bots, webhooks, our own relay)
    pub automated: bool,
}

impl InboundMessage {
    pub fn game_chat(author: Option<String>, text: impl Into<String>) -> Self {
        Self {
            source: ChatSource::GameChat,
            author,
            text: text.into(),
            automated: false,
        }
    }

    pub fn console(line: impl Into<String>) -> Self {
        Self {
            source: ChatSource::Console,
            author: None,
            text: line.into(),
            automated: false,
        }
    }

    pub fn remote(author: impl Into<String>, text: impl Into<String>, automated: bool) -> Self {
        Self {
            source: ChatSource::RemoteChannel,
            author: Some(author.into()),
            text: text.into(),
            automated,
        }
    }
}
