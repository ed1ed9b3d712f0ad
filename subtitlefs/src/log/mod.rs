//! Logging abstraction layer.
//!
//! Components never reach for a global logger. Each one receives an
//! `Arc<dyn Logger>` at construction, typically a [`TracingLogger`] tagged
//! with the component name, and logs through the provided macros:
//!
//! ```
//! use subtitlefs::log::{Logger, NoOpLogger};
//! use subtitlefs::{log_debug, log_info};
//! use std::sync::Arc;
//!
//! struct Scanner {
//!     logger: Arc<dyn Logger>,
//! }
//!
//! impl Scanner {
//!     fn scan(&self) {
//!         log_info!(self.logger, "Scanning tree");
//!         log_debug!(self.logger, "Scan complete");
//!     }
//! }
//!
//! let scanner = Scanner { logger: Arc::new(NoOpLogger) };
//! scanner.scan();
//! ```
//!
//! - `Logger`: the interface components log through
//! - `TracingLogger`: production adapter over the `tracing` crate
//! - `NoOpLogger`: discards everything
//! - `CaptureLogger`: keeps events in memory for assertions

mod noop;
mod tracing_adapter;
mod r#trait;

pub use noop::{CaptureLogger, NoOpLogger};
pub use r#trait::{LogLevel, Logger};
pub use tracing_adapter::TracingLogger;
