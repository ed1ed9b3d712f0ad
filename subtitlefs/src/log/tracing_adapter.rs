//! Tracing library adapter implementation.

use crate::log::{LogLevel, Logger};
use std::fmt::Arguments;

/// Logger that forwards to the `tracing` crate.
///
/// Every event carries a `component` field so output from the cache, the
/// coordinator and the FUSE layer can be told apart (and filtered) without
/// relying on module paths.
///
/// ```ignore
/// use subtitlefs::log::{Logger, TracingLogger};
/// use std::sync::Arc;
///
/// let logger: Arc<dyn Logger> = Arc::new(TracingLogger::new("cache"));
/// logger.info(format_args!("cache ready"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TracingLogger {
    component: &'static str,
}

impl TracingLogger {
    /// Create a tracing logger tagged with the given component name.
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    /// The component name attached to every event.
    pub fn component(&self) -> &'static str {
        self.component
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new("subtitlefs")
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        let component = self.component;
        match level {
            LogLevel::Trace => tracing::trace!(component, "{}", args),
            LogLevel::Debug => tracing::debug!(component, "{}", args),
            LogLevel::Info => tracing::info!(component, "{}", args),
            LogLevel::Warn => tracing::warn!(component, "{}", args),
            LogLevel::Error => tracing::error!(component, "{}", args),
        }
    }

    fn enabled(&self, level: LogLevel) -> bool {
        match level {
            LogLevel::Trace => tracing::enabled!(tracing::Level::TRACE),
            LogLevel::Debug => tracing::enabled!(tracing::Level::DEBUG),
            LogLevel::Info => tracing::enabled!(tracing::Level::INFO),
            LogLevel::Warn => tracing::enabled!(tracing::Level::WARN),
            LogLevel::Error => tracing::enabled!(tracing::Level::ERROR),
        }
    }
}
