use serde::{Deserialize, Serialize};
use std::fmt;

/// Credentials for the remote messaging channel (Discord)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteChannelConfig {
    pub token: String,
    pub channel_id: u64,
}

// Keep the token out of logs
impl fmt::Debug for RemoteChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteChannelConfig")
            .field("token", &"<redacted>")
            .field("channel_id", &self.channel_id)
            .finish()
    }
}
