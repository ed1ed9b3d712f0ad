//! Configuration for a subtitlefs mount.
//!
//! Settings come from three places, highest precedence first:
//!
//! 1. Command-line flags
//! 2. `-o key=value` mount options ([`MountOptionSet`])
//! 3. The INI file at `~/.subtitlefs/config.ini` ([`ConfigFile`])
//!
//! Whatever the source, they are folded into one immutable [`MountConfig`]
//! that is built once before mounting and shared by every component.

mod file;
mod mount;
mod options;

pub use file::{
    config_directory, config_file_path, CacheSettings, ConfigFile, ConfigFileError,
    ExtractionSettings, LoggingSettings, MountSettings,
};
pub use mount::{
    ConfigError, MountConfig, MountConfigBuilder, DEFAULT_CACHE_DIR, DEFAULT_EXTRACTION_TIMEOUT,
    DEFAULT_LANGUAGE, DEFAULT_SCAN_INTERVAL,
};
pub use options::MountOptionSet;
