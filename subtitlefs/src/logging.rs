//! Logging infrastructure.
//!
//! Installs the global `tracing` subscriber for a mount:
//! - optional log file, truncated when logging starts, written through a
//!   non-blocking appender
//! - optional terminal output
//! - level from the explicit setting, else `RUST_LOG`, else `info`

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default level when neither an explicit level nor `RUST_LOG` is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Where and how much to log.
#[derive(Debug, Clone, Default)]
pub struct LogSettings {
    /// Log file; `None` disables file output.
    pub file: Option<PathBuf>,
    /// Filter directive such as `debug` or `subtitlefs=trace`.
    pub level: Option<String>,
    /// Mirror events to stderr.
    pub terminal: bool,
}

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping it flushes the file writer; the mount keeps it until unmount.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the global subscriber.
///
/// # Errors
///
/// Fails if the log directory cannot be created, the log file cannot be
/// truncated, or the level is not a valid filter directive.
pub fn init_logging(settings: &LogSettings) -> Result<LoggingGuard, io::Error> {
    let env_filter = build_filter(settings.level.as_deref())?;

    let (file_layer, file_guard) = match &settings.file {
        Some(path) => {
            let (dir, name) = split_log_path(path)?;
            fs::create_dir_all(&dir)?;
            fs::write(&path, "")?;

            let appender = tracing_appender::rolling::never(&dir, &name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let terminal_layer = settings.terminal.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(true)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(terminal_layer)
        .try_init()
        .map_err(|e| io::Error::other(e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn build_filter(level: Option<&str>) -> Result<EnvFilter, io::Error> {
    match level {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string())),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))),
    }
}

fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf), io::Error> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("log path '{}' has no file name", path.display()),
        )
    })?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, PathBuf::from(name)))
}

// The global subscriber can only be installed once per process, so these
// tests cover the pieces around it rather than init_logging itself.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("/var/log/subtitlefs.log")).unwrap();
        assert_eq!(dir, PathBuf::from("/var/log"));
        assert_eq!(name, PathBuf::from("subtitlefs.log"));

        let (dir, name) = split_log_path(Path::new("subtitlefs.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, PathBuf::from("subtitlefs.log"));
    }

    #[test]
    fn test_split_log_path_without_file_name() {
        assert!(split_log_path(Path::new("/")).is_err());
    }

    #[test]
    fn test_build_filter_accepts_levels() {
        for level in ["trace", "debug", "info", "warn", "error", "subtitlefs=debug"] {
            assert!(build_filter(Some(level)).is_ok(), "{} should parse", level);
        }
    }

    #[test]
    fn test_build_filter_rejects_garbage() {
        let err = build_filter(Some("subtitlefs=loud")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_guard_structure() {
        use tracing_appender::non_blocking::NonBlocking;

        let (writer, guard) = NonBlocking::new(std::io::sink());
        drop(writer);
        let _with_file = LoggingGuard {
            _file_guard: Some(guard),
        };
        let _without_file = LoggingGuard { _file_guard: None };
    }
}
