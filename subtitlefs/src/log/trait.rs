//! The `Logger` interface and its formatting macros.

use std::fmt::{self, Arguments};

/// Severity of a log event, least severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for component log events.
///
/// Shared by every FUSE worker and the background coordinator, hence
/// `Send + Sync`. Only [`log`](Logger::log) is required.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, args: Arguments<'_>);

    /// Whether events at `level` would be recorded at all.
    ///
    /// The `log_*!` macros consult this before formatting, which keeps
    /// per-read trace events off the hot path when tracing is off.
    fn enabled(&self, _level: LogLevel) -> bool {
        true
    }

    fn trace(&self, args: Arguments<'_>) {
        self.log(LogLevel::Trace, args);
    }

    fn debug(&self, args: Arguments<'_>) {
        self.log(LogLevel::Debug, args);
    }

    fn info(&self, args: Arguments<'_>) {
        self.log(LogLevel::Info, args);
    }

    fn warn(&self, args: Arguments<'_>) {
        self.log(LogLevel::Warn, args);
    }

    fn error(&self, args: Arguments<'_>) {
        self.log(LogLevel::Error, args);
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($level:ident, $method:ident, $logger:expr, $($arg:tt)*) => {{
        let logger = &$logger;
        if logger.enabled($crate::log::LogLevel::$level) {
            logger.$method(format_args!($($arg)*));
        }
    }};
}

#[macro_export]
macro_rules! log_trace {
    ($logger:expr, $($arg:tt)*) => {
        $crate::__log_at!(Trace, trace, $logger, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $crate::__log_at!(Debug, debug, $logger, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $crate::__log_at!(Info, info, $logger, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $crate::__log_at!(Warn, warn, $logger, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $crate::__log_at!(Error, error, $logger, $($arg)*)
    };
}
