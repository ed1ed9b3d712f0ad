//! CLI runner for common setup.
//!
//! Loads the configuration file, initializes logging, owns the tokio
//! runtime, and layers command-line overrides over the file settings.

use crate::error::CliError;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use subtitlefs::config::{ConfigFile, MountConfig, MountOptionSet};
use subtitlefs::logging::{init_logging, LogSettings, LoggingGuard};
use tokio::runtime::Runtime;
use tracing::info;

/// Per-invocation settings that override the configuration file.
#[derive(Debug, Clone, Default)]
pub struct MountOverrides {
    pub root: Option<PathBuf>,
    pub language: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub cache_only: Option<bool>,
}

impl MountOverrides {
    /// Fill gaps left by command-line flags from `-o` mount options.
    pub fn or_options(self, options: &MountOptionSet) -> Self {
        Self {
            root: self.root.or_else(|| options.root.clone()),
            language: self.language.or_else(|| options.language.clone()),
            cache_dir: self.cache_dir.or_else(|| options.cache_dir.clone()),
            cache_only: self.cache_only.or(options.cache_only),
        }
    }
}

/// Logging destination and level requested on the command line.
#[derive(Debug, Clone, Default)]
pub struct LogOverrides {
    pub file: Option<PathBuf>,
    pub level: Option<String>,
}

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Keeps the log writer alive; dropping it flushes the log file
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config: ConfigFile,
    runtime: Runtime,
}

impl CliRunner {
    pub fn new(config_path: Option<&Path>, log: LogOverrides) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };

        let settings = LogSettings {
            file: log.file.or_else(|| config.logging.file.clone()),
            level: log.level.or_else(|| config.logging.level.clone()),
            terminal: true,
        };
        let logging_guard =
            init_logging(&settings).map_err(|e| CliError::LoggingInit(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("subtitlefs")
            .build()
            .map_err(CliError::Runtime)?;

        Ok(Self {
            logging_guard,
            config,
            runtime,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!("subtitlefs v{}", subtitlefs::VERSION);
        info!("subtitlefs CLI: {} command", command);
    }

    /// Build the mount configuration: overrides, then the file, then defaults.
    ///
    /// `fallback_root` is used when neither names a source root.
    pub fn mount_config(
        &self,
        overrides: MountOverrides,
        fallback_root: Option<PathBuf>,
    ) -> Result<Arc<MountConfig>, CliError> {
        let root = overrides
            .root
            .or_else(|| self.config.mount.root.clone())
            .or(fallback_root)
            .ok_or_else(|| {
                CliError::Config(
                    "no source directory: pass --root, -o root=<dir>, or set [mount] root"
                        .to_string(),
                )
            })?;

        let mut builder = self.config.mount_builder(root);
        if let Some(language) = overrides.language {
            builder = builder.language(language);
        }
        if let Some(cache_dir) = overrides.cache_dir {
            builder = builder.cache_dir(cache_dir);
        }
        if let Some(cache_only) = overrides.cache_only {
            builder = builder.cache_only(cache_only);
        }
        Ok(Arc::new(builder.build()?))
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
