//! Cache management CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Subcommand;
use subtitlefs::cache::{language_dir, CacheStore};
use subtitlefs::demux::MkvToolnixDemuxer;
use subtitlefs::log::TracingLogger;

use super::common::TargetArgs;
use crate::error::CliError;
use crate::runner::{CliRunner, LogOverrides};

#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Remove cached subtitles whose source video no longer exists
    Prune {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Remove every cached subtitle for the language
    Clear {
        #[command(flatten)]
        target: TargetArgs,
    },
}

pub fn run(action: CacheAction, config_path: Option<&Path>) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path, LogOverrides::default())?;
    runner.log_startup("cache");

    let target = match &action {
        CacheAction::Prune { target } | CacheAction::Clear { target } => target,
    };
    let mut overrides = target.overrides();
    overrides.cache_only = Some(true);
    // Maintenance never reads the source tree through the root.
    let config = runner.mount_config(overrides, Some(PathBuf::from("/")))?;
    let language_root = language_dir(config.cache_dir(), config.language());

    let demuxer = MkvToolnixDemuxer::for_mount(&config, Arc::new(TracingLogger::new("demuxer")))?;
    let cache = CacheStore::new(
        config.clone(),
        Arc::new(demuxer),
        Arc::new(TracingLogger::new("cache")),
    );

    match action {
        CacheAction::Prune { .. } => {
            println!("Pruning orphaned subtitles in {}", language_root.display());
            let report = runner.block_on(cache.prune_orphans())?;
            println!(
                "Removed {} files and {} empty directories",
                report.files_removed, report.dirs_removed
            );
        }
        CacheAction::Clear { .. } => {
            println!("Clearing {}", language_root.display());
            runner.block_on(cache.clear())?;
            println!("Cache cleared");
        }
    }
    Ok(())
}
