//! Immutable mount configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Subtitle language used when none is configured.
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Cache root used when none is configured.
pub const DEFAULT_CACHE_DIR: &str = "/tmp/.subtitlefs";

/// Pause between two background scan passes.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound on a single external demuxer invocation.
pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors raised while validating a mount configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("source root '{path}' is not accessible: {source}")]
    RootInaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source root '{0}' is not a directory")]
    RootNotDirectory(PathBuf),

    #[error("invalid language '{0}': expected a three-letter code such as 'eng'")]
    InvalidLanguage(String),

    #[error("cache directory '{0}' must not be empty")]
    EmptyCacheDir(PathBuf),
}

/// Configuration shared by every component of one mount.
///
/// Built once through [`MountConfig::builder`] and never mutated afterwards;
/// components hold it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct MountConfig {
    root: PathBuf,
    language: String,
    cache_dir: PathBuf,
    cache_only: bool,
    scan_interval: Duration,
    extraction_timeout: Duration,
    prune_orphans: bool,
}

impl MountConfig {
    /// Start building a configuration for the given source tree.
    pub fn builder(root: impl Into<PathBuf>) -> MountConfigBuilder {
        MountConfigBuilder::new(root)
    }

    /// Canonical path of the source video tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lower-cased three-letter subtitle language.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Root of the on-disk subtitle cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Scratch directory for in-progress extractions.
    ///
    /// The leading dot keeps it clear of the per-language subtrees.
    pub fn tmp_dir(&self) -> PathBuf {
        self.cache_dir.join(".tmp")
    }

    /// When set, the background coordinator is not started.
    pub fn cache_only(&self) -> bool {
        self.cache_only
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    pub fn extraction_timeout(&self) -> Duration {
        self.extraction_timeout
    }

    /// Whether orphaned cache entries are removed after each scan pass.
    pub fn prune_orphans(&self) -> bool {
        self.prune_orphans
    }
}

/// Builder for [`MountConfig`].
#[derive(Debug, Clone)]
pub struct MountConfigBuilder {
    root: PathBuf,
    language: String,
    cache_dir: PathBuf,
    cache_only: bool,
    scan_interval: Duration,
    extraction_timeout: Duration,
    prune_orphans: bool,
}

impl MountConfigBuilder {
    fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            language: DEFAULT_LANGUAGE.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            cache_only: false,
            scan_interval: DEFAULT_SCAN_INTERVAL,
            extraction_timeout: DEFAULT_EXTRACTION_TIMEOUT,
            prune_orphans: false,
        }
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn cache_only(mut self, cache_only: bool) -> Self {
        self.cache_only = cache_only;
        self
    }

    pub fn scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    pub fn extraction_timeout(mut self, timeout: Duration) -> Self {
        self.extraction_timeout = timeout;
        self
    }

    pub fn prune_orphans(mut self, prune: bool) -> Self {
        self.prune_orphans = prune;
        self
    }

    /// Validate the settings and produce the immutable configuration.
    ///
    /// The root is canonicalized so that every path derived from it (and
    /// every cache path mirrored from those) is absolute and symlink-free.
    pub fn build(self) -> Result<MountConfig, ConfigError> {
        let root =
            std::fs::canonicalize(&self.root).map_err(|source| ConfigError::RootInaccessible {
                path: self.root.clone(),
                source,
            })?;
        if !root.is_dir() {
            return Err(ConfigError::RootNotDirectory(root));
        }

        let language = self.language.trim().to_ascii_lowercase();
        if language.len() != 3 || !language.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidLanguage(self.language));
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyCacheDir(self.cache_dir));
        }
        let cache_dir = if self.cache_dir.is_absolute() {
            self.cache_dir
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&self.cache_dir))
                .unwrap_or(self.cache_dir)
        };

        Ok(MountConfig {
            root,
            language,
            cache_dir,
            cache_only: self.cache_only,
            scan_interval: self.scan_interval,
            extraction_timeout: self.extraction_timeout,
            prune_orphans: self.prune_orphans,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let root = TempDir::new().unwrap();
        let config = MountConfig::builder(root.path()).build().unwrap();

        assert_eq!(config.language(), "eng");
        assert_eq!(config.cache_dir(), Path::new(DEFAULT_CACHE_DIR));
        assert_eq!(config.tmp_dir(), Path::new(DEFAULT_CACHE_DIR).join(".tmp"));
        assert!(!config.cache_only());
        assert!(!config.prune_orphans());
        assert_eq!(config.scan_interval(), Duration::from_secs(60));
        assert_eq!(config.root(), std::fs::canonicalize(root.path()).unwrap());
    }

    #[test]
    fn test_language_is_normalized() {
        let root = TempDir::new().unwrap();
        let config = MountConfig::builder(root.path())
            .language(" FRE ")
            .build()
            .unwrap();
        assert_eq!(config.language(), "fre");
    }

    #[test]
    fn test_invalid_language_rejected() {
        let root = TempDir::new().unwrap();
        for bad in ["en", "english", "e1g", ""] {
            let result = MountConfig::builder(root.path()).language(bad).build();
            assert!(
                matches!(result, Err(ConfigError::InvalidLanguage(_))),
                "'{}' should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_missing_root_rejected() {
        let root = TempDir::new().unwrap();
        let missing = root.path().join("does-not-exist");
        let result = MountConfig::builder(&missing).build();
        assert!(matches!(result, Err(ConfigError::RootInaccessible { .. })));
    }

    #[test]
    fn test_file_root_rejected() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("movie.mkv");
        std::fs::write(&file, b"x").unwrap();
        let result = MountConfig::builder(&file).build();
        assert!(matches!(result, Err(ConfigError::RootNotDirectory(_))));
    }

    #[test]
    fn test_builder_overrides() {
        let root = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let config = MountConfig::builder(root.path())
            .cache_dir(cache.path())
            .cache_only(true)
            .prune_orphans(true)
            .scan_interval(Duration::from_secs(5))
            .extraction_timeout(Duration::from_secs(7))
            .build()
            .unwrap();

        assert_eq!(config.cache_dir(), cache.path());
        assert!(config.cache_only());
        assert!(config.prune_orphans());
        assert_eq!(config.scan_interval(), Duration::from_secs(5));
        assert_eq!(config.extraction_timeout(), Duration::from_secs(7));
    }
}
