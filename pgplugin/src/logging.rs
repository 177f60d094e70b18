//! Process logging for command-line use.
//!
//! Events go to stderr through `tracing_subscriber::fmt`, filtered by
//! `RUST_LOG` (default `info`, `debug` when verbose). An optional log file is
//! written through a non-blocking `tracing_appender` worker; keep the returned
//! [`LoggingGuard`] alive until exit so buffered lines are flushed.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log file name inside the log directory.
pub const LOG_FILE_NAME: &str = "pgplugin.log";

/// Logging setup errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Log file path has no file name: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("Failed to install log subscriber: {0}")]
    Install(String),
}

/// Keeps the file writer alive.
#[must_use = "dropping the guard stops the log file writer"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Default log file (`~/.pgplugin/pgplugin.log`).
pub fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pgplugin")
        .join(LOG_FILE_NAME)
}

/// Install the global subscriber.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<LoggingGuard, LoggingError> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let mut guard = None;
    let file_layer = match log_file {
        Some(path) => {
            let (writer, worker) = file_writer(path)?;
            guard = Some(worker);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

fn file_writer(
    path: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), LoggingError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidPath(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|source| LoggingError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let appender = tracing_appender::rolling::never(&dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_log_path() {
        let path = default_log_path();
        assert!(path.ends_with(".pgplugin/pgplugin.log"));
    }

    #[test]
    fn test_file_writer_creates_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("run.log");
        let (_writer, _guard) = file_writer(&path).unwrap();
        assert!(dir.path().join("logs").is_dir());
    }

    #[test]
    fn test_file_writer_rejects_directory_path() {
        assert!(matches!(
            file_writer(Path::new("/")),
            Err(LoggingError::InvalidPath(_))
        ));
    }
}
