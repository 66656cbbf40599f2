//! Verb grammars for game-chat (`!`-prefixed) and console commands.

use romi_client::config::parse_address;
use thiserror::Error;

pub const CHAT_HELP: &str = "Commands: !afk on|off, !status, !help, !sort on|off, \
!repeat on <message>, !repeat off, !set-address <host:port>, !set-identity <name>, !show-address";

pub const CONSOLE_HELP: &[&str] = &[
    "Available commands:",
    "  set-address <host:port>  - Change server address and reconnect",
    "  set-identity <name>      - Change username and reconnect",
    "  status                   - Show health and food",
    "  help                     - Show this list",
    "  exit                     - Quit",
];

/// Console `help` output: the console verbs, then the in-game commands
pub fn console_help() -> impl Iterator<Item = String> {
    CONSOLE_HELP
        .iter()
        .map(|line| line.to_string())
        .chain(std::iter::once(format!("In game chat: {}", CHAT_HELP)))
}

/// Malformed command input; the message is sent back to whoever typed it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unknown command: {0}")]
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    AntiIdle(Toggle),
    Help,
    Status,
    Sort(Toggle),
    RepeatOn(String),
    RepeatOff,
    SetAddress { host: String, port: u16 },
    SetIdentity(String),
    ShowAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    SetAddress { host: String, port: u16 },
    SetIdentity(String),
    Status,
    Help,
    Exit,
}

/// Parse a game chat line.
///
/// Returns `None` for ordinary chat and unknown verbs, which are ignored.
pub fn parse_chat_command(text: &str) -> Option<Result<ChatCommand, CommandError>> {
    let rest = text.trim().strip_prefix('!')?;
    let mut words = rest.split_whitespace();
    let verb = words.next()?.to_ascii_lowercase();

    let command = match verb.as_str() {
        "afk" => toggle(words.next(), "!afk on|off").map(ChatCommand::AntiIdle),
        "help" => Ok(ChatCommand::Help),
        "status" => Ok(ChatCommand::Status),
        "sort" => toggle(words.next(), "!sort on|off").map(ChatCommand::Sort),
        "repeat" => {
            const USAGE: &str = "!repeat on <message> or !repeat off";
            match words.next() {
                Some("on") => {
                    let message = words.collect::<Vec<_>>().join(" ");
                    if message.is_empty() {
                        Err(CommandError::Usage(USAGE))
                    } else {
                        Ok(ChatCommand::RepeatOn(message))
                    }
                }
                Some("off") => Ok(ChatCommand::RepeatOff),
                _ => Err(CommandError::Usage(USAGE)),
            }
        }
        "set-address" | "setip" => address(words.next(), "!set-address <host:port>")
            .map(|(host, port)| ChatCommand::SetAddress { host, port }),
        "set-identity" | "setname" => {
            identity(words.next(), "!set-identity <name>").map(ChatCommand::SetIdentity)
        }
        "show-address" | "server" => Ok(ChatCommand::ShowAddress),
        _ => return None,
    };
    Some(command)
}

/// Parse a console line. Blank lines yield `None`.
pub fn parse_console_command(line: &str) -> Option<Result<ConsoleCommand, CommandError>> {
    let mut words = line.split_whitespace();
    let verb = words.next()?.to_ascii_lowercase();

    let command = match verb.as_str() {
        "set-address" | "setip" => address(words.next(), "set-address <host:port>")
            .map(|(host, port)| ConsoleCommand::SetAddress { host, port }),
        "set-identity" | "setname" => {
            identity(words.next(), "set-identity <name>").map(ConsoleCommand::SetIdentity)
        }
        "status" => Ok(ConsoleCommand::Status),
        "help" => Ok(ConsoleCommand::Help),
        "exit" | "quit" => Ok(ConsoleCommand::Exit),
        _ => Err(CommandError::Unknown(verb)),
    };
    Some(command)
}

fn toggle(arg: Option<&str>, usage: &'static str) -> Result<Toggle, CommandError> {
    match arg.map(str::to_ascii_lowercase).as_deref() {
        Some("on") => Ok(Toggle::On),
        Some("off") => Ok(Toggle::Off),
        _ => Err(CommandError::Usage(usage)),
    }
}

fn address(arg: Option<&str>, usage: &'static str) -> Result<(String, u16), CommandError> {
    let arg = arg.ok_or(CommandError::Usage(usage))?;
    parse_address(arg).map_err(|_| CommandError::InvalidAddress(arg.to_string()))
}

fn identity(arg: Option<&str>, usage: &'static str) -> Result<String, CommandError> {
    arg.map(str::to_string).ok_or(CommandError::Usage(usage))
}
