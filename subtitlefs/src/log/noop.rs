//! Loggers that do not write anywhere: one discards, one remembers.

use crate::log::{LogLevel, Logger};
use std::fmt::Arguments;
use std::sync::Mutex;

/// Discards every event without formatting it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    #[inline]
    fn log(&self, _level: LogLevel, _args: Arguments<'_>) {}

    #[inline]
    fn enabled(&self, _level: LogLevel) -> bool {
        false
    }
}

/// Keeps every event in memory so tests can assert on what was reported.
#[derive(Debug, Default)]
pub struct CaptureLogger {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl CaptureLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events so far, oldest first.
    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Whether an event at `level` mentions `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.entries()
            .iter()
            .any(|(l, message)| *l == level && message.contains(needle))
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.entries().iter().filter(|(l, _)| *l == level).count()
    }
}

impl Logger for CaptureLogger {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((level, args.to_string()));
        }
    }
}
