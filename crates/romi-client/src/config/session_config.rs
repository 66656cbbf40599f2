use serde::{Deserialize, Serialize};
use std::fmt;

use super::ConfigError;

pub const DEFAULT_PORT: u16 = 25565;

/// Connection parameters for the game session
///
/// Mutable at runtime through `set-address` / `set-identity`; every change
/// forces a reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    /// Login name
    pub identity: String,
    pub protocol_version: String,
    /// Delay before reconnecting after a lost connection (default: 10000)
    pub reconnect_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            identity: "Romi".to_string(),
            protocol_version: "1.20.1".to_string(),
            reconnect_delay_ms: 10_000,
        }
    }
}

impl SessionConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Apply a partial update, returning true if anything changed
    pub fn apply(&mut self, update: SessionConfigUpdate) -> bool {
        let before = self.clone();
        if let Some(host) = update.host {
            self.host = host;
        }
        if let Some(port) = update.port {
            self.port = port;
        }
        if let Some(identity) = update.identity {
            self.identity = identity;
        }
        *self != before
    }
}

impl fmt::Display for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.identity, self.host, self.port)
    }
}

/// Partial session config change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfigUpdate {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub identity: Option<String>,
}

impl SessionConfigUpdate {
    pub fn address(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            identity: None,
        }
    }

    pub fn identity(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
            ..Default::default()
        }
    }
}

/// Parse `host[:port]`; the port defaults to [`DEFAULT_PORT`]
pub fn parse_address(input: &str) -> Result<(String, u16), ConfigError> {
    let input = input.trim();
    let (host, port) = match input.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| ConfigError::InvalidAddress(input.to_string()))?;
            (host, port)
        }
        None => (input, DEFAULT_PORT),
    };

    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(ConfigError::InvalidAddress(input.to_string()));
    }

    Ok((host.to_string(), port))
}
