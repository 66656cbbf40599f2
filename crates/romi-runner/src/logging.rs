//! Console and optional file logging for the romi binaries.

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use romi_client::config::ProjectPaths;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Gateway heartbeats from serenity drown out session logs at `info`
const DEFAULT_FILTER: &str = "info,serenity=warn";

/// A log over this size is rolled to `<component>.log.1` at startup
const ROLL_SIZE: u64 = 1024 * 1024;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber for `component`.
///
/// With `file_logging`, records are also appended to
/// `<data_dir>/logs/<component>.log` through a non-blocking writer; the
/// returned guard flushes it on drop and must outlive the program's logging.
pub fn init_logging(component: &str, file_logging: bool) -> io::Result<Option<WorkerGuard>> {
    if !file_logging {
        tracing_subscriber::fmt().with_env_filter(env_filter()).init();
        return Ok(None);
    }

    let log_path = log_file_path(component)?;
    let (writer, guard) = open_log(&log_path)?;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(io::stdout))
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    tracing::info!("Logging to file: {}", log_path.display());
    Ok(Some(guard))
}

pub fn log_file_path(component: &str) -> io::Result<PathBuf> {
    let paths = ProjectPaths::new("romi")
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory for logs"))?;
    Ok(paths.log_dir().join(format!("{component}.log")))
}

fn open_log(
    path: &Path,
) -> io::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    roll_if_oversized(path)?;

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(tracing_appender::non_blocking(BufWriter::new(file)))
}

/// Move an oversized log aside, replacing any earlier rolled file
fn roll_if_oversized(path: &Path) -> io::Result<bool> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > ROLL_SIZE => {
            let mut rolled = path.as_os_str().to_owned();
            rolled.push(".1");
            fs::rename(path, PathBuf::from(rolled))?;
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_log_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("romi.log");
        fs::write(&log, b"Logged in as Romi").unwrap();

        assert!(!roll_if_oversized(&log).unwrap());
        assert_eq!(fs::read(&log).unwrap(), b"Logged in as Romi");
    }

    #[test]
    fn test_oversized_log_is_rolled() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("romi.log");
        let rolled = dir.path().join("romi.log.1");
        fs::write(&rolled, b"older").unwrap();
        fs::write(&log, vec![b'x'; (ROLL_SIZE + 1) as usize]).unwrap();

        assert!(roll_if_oversized(&log).unwrap());
        assert!(!log.exists());
        assert_eq!(fs::metadata(&rolled).unwrap().len(), ROLL_SIZE + 1);
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("logs").join("romi.log");

        let (_writer, _guard) = open_log(&log).unwrap();
        assert!(log.exists());
        assert!(!roll_if_oversized(&dir.path().join("missing.log")).unwrap());
    }

    #[test]
    fn test_log_file_named_after_component() {
        if let Ok(path) = log_file_path("discord") {
            assert_eq!(path.file_name().unwrap(), "discord.log");
            assert!(path.parent().unwrap().ends_with("logs"));
        }
    }
}
