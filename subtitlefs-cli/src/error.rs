//! CLI error handling with user-friendly messages.

use std::fmt;
use std::io;
use std::process;
use subtitlefs::cache::CacheError;
use subtitlefs::config::{ConfigError, ConfigFileError};
use subtitlefs::demux::DemuxError;
use subtitlefs::fuse::MountError;

#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file, mount option or flag problem
    Config(String),
    /// Could not start the async runtime
    Runtime(io::Error),
    /// MKVToolNix missing or failing
    Tools(DemuxError),
    /// Cache maintenance failed
    Cache(CacheError),
    /// Mounting or serving failed
    Mount(MountError),
}

impl CliError {
    /// Exit the process with an error message and hints.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Tools(DemuxError::ToolNotFound { .. })
            | CliError::Mount(MountError::Demuxer(DemuxError::ToolNotFound { .. })) => {
                eprintln!();
                eprintln!("subtitlefs needs mkvmerge and mkvextract from MKVToolNix:");
                eprintln!("  Debian/Ubuntu: sudo apt install mkvtoolnix");
                eprintln!("  Fedora:        sudo dnf install mkvtoolnix");
                eprintln!("Or mount with --cache-only to serve existing cache entries.");
            }
            CliError::Mount(MountError::MountFailed(_)) => {
                eprintln!();
                eprintln!("Common issues:");
                eprintln!("  1. FUSE not installed: sudo apt install fuse3");
                eprintln!("  2. Permissions: your user may need to be in the 'fuse' group");
                eprintln!("  3. Mountpoint in use: fusermount -u <mountpoint>");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
            CliError::Tools(e) => write!(f, "Subtitle tools: {}", e),
            CliError::Cache(e) => write!(f, "Cache error: {}", e),
            CliError::Mount(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Runtime(e) => Some(e),
            CliError::Tools(e) => Some(e),
            CliError::Cache(e) => Some(e),
            CliError::Mount(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<DemuxError> for CliError {
    fn from(e: DemuxError) -> Self {
        CliError::Tools(e)
    }
}

impl From<CacheError> for CliError {
    fn from(e: CacheError) -> Self {
        CliError::Cache(e)
    }
}

impl From<MountError> for CliError {
    fn from(e: MountError) -> Self {
        CliError::Mount(e)
    }
}
