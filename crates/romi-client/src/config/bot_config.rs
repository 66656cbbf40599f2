use std::collections::HashMap;
use std::{fs, path::Path, path::PathBuf};

use romi_events::BlockPos;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{
    paths::ProjectPaths, remote_config::RemoteChannelConfig, session_config::SessionConfig,
    sort_config::SortConfig,
};

/// Dotenv file read from the working directory
pub const ENV_FILE: &str = ".env";

/// Invalid configuration values
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },
    #[error("invalid address {0:?}, expected <host:port>")]
    InvalidAddress(String),
}

#[derive(Debug)]
pub enum ConfigLoadError {
    NotFound(PathBuf),
    ParseError(String),
    IoError(String),
    Invalid(ConfigError),
}

impl std::fmt::Display for ConfigLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigLoadError::NotFound(path) => {
                write!(f, "Config file not found: {}", path.display())
            }
            ConfigLoadError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigLoadError::IoError(msg) => write!(f, "IO error reading config: {}", msg),
            ConfigLoadError::Invalid(err) => write!(f, "Invalid configuration: {}", err),
        }
    }
}

impl std::error::Error for ConfigLoadError {}

impl From<ConfigError> for ConfigLoadError {
    fn from(err: ConfigError) -> Self {
        ConfigLoadError::Invalid(err)
    }
}

/// Full bot configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub session: SessionConfig,
    /// Time between anti-idle actions (default: 20000)
    pub anti_afk_interval_ms: u64,
    pub sort: SortConfig,
    /// Remote relay credentials; `None` disables the relay
    pub remote: Option<RemoteChannelConfig>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            anti_afk_interval_ms: 20_000,
            sort: SortConfig::default(),
            remote: None,
        }
    }
}

impl BotConfig {
    pub fn default_path() -> Option<PathBuf> {
        ProjectPaths::new("romi").map(|p| p.config_file())
    }

    /// Load the config: defaults, then the TOML file, then the environment.
    ///
    /// The environment is the process environment backed by `./.env`; a
    /// variable set in the process wins over the same one in the file.
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => Self::default(),
            },
        };

        let dotenv = read_env_file(Path::new(ENV_FILE))?;
        config.apply_env(with_fallback(|var| std::env::var(var).ok(), &dotenv))?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        if !path.exists() {
            return Err(ConfigLoadError::NotFound(path.to_path_buf()));
        }

        let content =
            fs::read_to_string(path).map_err(|e| ConfigLoadError::IoError(e.to_string()))?;
        let config =
            toml::from_str(&content).map_err(|e| ConfigLoadError::ParseError(e.to_string()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Override fields from environment-style variables.
    ///
    /// Unset and empty variables leave the current value alone.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("HOST") {
            self.session.host = host;
        }
        if let Some(port) = parse_var(&get, "PORT")? {
            self.session.port = port;
        }
        if let Some(identity) = get("USERNAME") {
            self.session.identity = identity;
        }
        if let Some(version) = get("VERSION") {
            self.session.protocol_version = version;
        }
        if let Some(delay) = parse_var(&get, "RECONNECT_DELAY")? {
            self.session.reconnect_delay_ms = delay;
        }
        if let Some(interval) = parse_var(&get, "ANTI_AFK_INTERVAL")? {
            self.anti_afk_interval_ms = interval;
        }
        if let Some(interval) = parse_var(&get, "INTERVAL")? {
            self.sort.interval_ms = interval;
        }
        if let Some(timeout) = parse_var(&get, "NAVIGATION_TIMEOUT")? {
            self.sort.navigation_timeout_ms = timeout;
        }
        self.sort.region.from = env_block_pos(&get, "CHEST_FROM", self.sort.region.from)?;
        self.sort.region.to = env_block_pos(&get, "CHEST_TO", self.sort.region.to)?;

        if let Some(token) = get("DISCORD_TOKEN") {
            match parse_var::<u64, _>(&get, "DISCORD_CHANNEL_ID")? {
                Some(channel_id) => {
                    self.remote = Some(RemoteChannelConfig { token, channel_id });
                }
                None => {
                    warn!("DISCORD_TOKEN set without DISCORD_CHANNEL_ID - remote relay disabled");
                    self.remote = None;
                }
            }
        }

        Ok(())
    }
}

/// Variables from a dotenv file; a missing file yields none
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigLoadError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let vars = dotenvy::from_path_iter(path)
        .and_then(|iter| iter.collect::<Result<HashMap<_, _>, _>>())
        .map_err(|e| ConfigLoadError::ParseError(format!("{}: {}", path.display(), e)))?;
    info!("Loaded {} variables from {}", vars.len(), path.display());
    Ok(vars)
}

fn with_fallback<'a, F>(
    primary: F,
    fallback: &'a HashMap<String, String>,
) -> impl Fn(&str) -> Option<String> + 'a
where
    F: Fn(&str) -> Option<String> + 'a,
{
    move |var| primary(var).or_else(|| fallback.get(var).cloned())
}

fn parse_var<T, G>(get: &G, var: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                var: var.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

fn env_block_pos<G>(get: &G, prefix: &str, current: BlockPos) -> Result<BlockPos, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    Ok(BlockPos {
        x: parse_var(get, &format!("{prefix}_X"))?.unwrap_or(current.x),
        y: parse_var(get, &format!("{prefix}_Y"))?.unwrap_or(current.y),
        z: parse_var(get, &format!("{prefix}_Z"))?.unwrap_or(current.z),
    })
}
