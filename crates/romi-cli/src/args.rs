use std::path::PathBuf;

use clap::Parser;
use romi_client::config::BotConfig;

#[derive(Debug, Parser)]
#[command(version, about = "Keeps a game session alive and relays its chat", long_about = None)]
pub struct Cli {
    /// Config file (defaults to config.toml in the user config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Server host, overrides HOST
    #[arg(long)]
    pub host: Option<String>,

    /// Server port, overrides PORT
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Login name, overrides USERNAME
    #[arg(short, long)]
    pub username: Option<String>,

    /// Run against the built-in simulated server
    #[arg(long)]
    pub simulate: bool,

    /// Also write logs to <data dir>/logs/romi.log
    #[arg(long)]
    pub log_file: bool,
}

impl Cli {
    /// Flags win over the file and environment
    pub fn apply(&self, config: &mut BotConfig) {
        if let Some(host) = &self.host {
            config.session.host = host.clone();
        }
        if let Some(port) = self.port {
            config.session.port = port;
        }
        if let Some(username) = &self.username {
            config.session.identity = username.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from(["romi", "--host", "mc.example.org", "-u", "Alex", "--simulate"]);
        let mut config = BotConfig::default();
        cli.apply(&mut config);

        assert!(cli.simulate);
        assert_eq!(config.session.host, "mc.example.org");
        assert_eq!(config.session.port, 25565);
        assert_eq!(config.session.identity, "Alex");
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(Cli::try_parse_from(["romi", "--port", "70000"]).is_err());
    }
}
