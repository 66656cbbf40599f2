use std::io::{self, BufRead};
use std::thread;

use romi_runner::BotHandle;
use tracing::{debug, warn};

/// Read stdin lines on a dedicated thread and hand them to the bot.
///
/// The thread ends on EOF or once the bot stops accepting input; it is never
/// joined, so a pending read cannot hold up process exit.
pub fn spawn_reader(bot: BotHandle) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("romi-console".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if !bot.console_line(line) {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(target: "console", "Failed to read console input: {}", e);
                        break;
                    }
                }
            }
            debug!(target: "console", "Console reader stopped");
        })
}
