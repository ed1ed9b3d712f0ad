//! INI configuration file.
//!
//! ```ini
//! [mount]
//! root = ~/Videos
//! language = eng
//!
//! [cache]
//! directory = /tmp/.subtitlefs
//! only = false
//! prune_orphans = false
//!
//! [extraction]
//! scan_interval = 60
//! timeout = 120
//!
//! [logging]
//! file = ~/.subtitlefs/subtitlefs.log
//! level = info
//! ```

use super::mount::{
    MountConfig, MountConfigBuilder, DEFAULT_CACHE_DIR, DEFAULT_EXTRACTION_TIMEOUT,
    DEFAULT_LANGUAGE, DEFAULT_SCAN_INTERVAL,
};
use ini::Ini;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// `[mount]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSettings {
    pub root: Option<PathBuf>,
    pub language: String,
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub directory: PathBuf,
    pub only: bool,
    pub prune_orphans: bool,
}

/// `[extraction]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSettings {
    pub scan_interval: Duration,
    pub timeout: Duration,
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    pub file: Option<PathBuf>,
    pub level: Option<String>,
}

/// Parsed configuration file with defaults for every missing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub mount: MountSettings,
    pub cache: CacheSettings,
    pub extraction: ExtractionSettings,
    pub logging: LoggingSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            mount: MountSettings {
                root: None,
                language: DEFAULT_LANGUAGE.to_string(),
            },
            cache: CacheSettings {
                directory: PathBuf::from(DEFAULT_CACHE_DIR),
                only: false,
                prune_orphans: false,
            },
            extraction: ExtractionSettings {
                scan_interval: DEFAULT_SCAN_INTERVAL,
                timeout: DEFAULT_EXTRACTION_TIMEOUT,
            },
            logging: LoggingSettings::default(),
        }
    }
}

impl ConfigFile {
    /// Load configuration from the default path (~/.subtitlefs/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    /// Seed a [`MountConfig`] builder from these settings.
    ///
    /// `root` wins over `[mount] root`; callers layer their own overrides on
    /// the returned builder.
    pub fn mount_builder(&self, root: impl Into<PathBuf>) -> MountConfigBuilder {
        MountConfig::builder(root)
            .language(self.mount.language.clone())
            .cache_dir(self.cache.directory.clone())
            .cache_only(self.cache.only)
            .prune_orphans(self.cache.prune_orphans)
            .scan_interval(self.extraction.scan_interval)
            .extraction_timeout(self.extraction.timeout)
    }
}

/// Path to the config directory (~/.subtitlefs).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".subtitlefs")
}

/// Path to the config file (~/.subtitlefs/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("mount")) {
        if let Some(v) = section.get("root") {
            let v = v.trim();
            if !v.is_empty() {
                config.mount.root = Some(expand_tilde(v));
            }
        }
        if let Some(v) = section.get("language") {
            let v = v.trim().to_ascii_lowercase();
            if v.len() != 3 || !v.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(invalid("mount", "language", &v, "must be a three-letter code"));
            }
            config.mount.language = v;
        }
    }

    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if v.is_empty() {
                return Err(invalid("cache", "directory", v, "must not be empty"));
            }
            config.cache.directory = expand_tilde(v);
        }
        if let Some(v) = section.get("only") {
            config.cache.only = parse_bool("cache", "only", v)?;
        }
        if let Some(v) = section.get("prune_orphans") {
            config.cache.prune_orphans = parse_bool("cache", "prune_orphans", v)?;
        }
    }

    if let Some(section) = ini.section(Some("extraction")) {
        if let Some(v) = section.get("scan_interval") {
            config.extraction.scan_interval = parse_seconds("extraction", "scan_interval", v)?;
        }
        if let Some(v) = section.get("timeout") {
            config.extraction.timeout = parse_seconds("extraction", "timeout", v)?;
        }
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = Some(expand_tilde(v));
            }
        }
        if let Some(v) = section.get("level") {
            let v = v.trim().to_ascii_lowercase();
            if !["trace", "debug", "info", "warn", "error"].contains(&v.as_str()) {
                return Err(invalid(
                    "logging",
                    "level",
                    &v,
                    "must be one of: trace, debug, info, warn, error",
                ));
            }
            config.logging.level = Some(v);
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(section, key, value, "must be true or false")),
    }
}

fn parse_seconds(section: &str, key: &str, value: &str) -> Result<Duration, ConfigFileError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(invalid(section, key, value, "must be a positive number of seconds")),
    }
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
