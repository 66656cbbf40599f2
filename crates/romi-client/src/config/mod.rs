pub mod bot_config;
pub mod paths;
pub mod remote_config;
pub mod session_config;
pub mod sort_config;

pub use bot_config::{BotConfig, ConfigError, ConfigLoadError};
pub use paths::ProjectPaths;
pub use remote_config::RemoteChannelConfig;
pub use session_config::{DEFAULT_PORT, SessionConfig, SessionConfigUpdate, parse_address};
pub use sort_config::{SortConfig, SortRegion};
