//! Scan command - warm the cache once without mounting.

use std::path::Path;
use std::sync::Arc;

use clap::Args;
use subtitlefs::cache::CacheStore;
use subtitlefs::coordinator::ExtractionCoordinator;
use subtitlefs::demux::MkvToolnixDemuxer;
use subtitlefs::log::TracingLogger;

use super::common::TargetArgs;
use crate::error::CliError;
use crate::runner::{CliRunner, LogOverrides};

#[derive(Debug, Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

pub fn run(args: ScanArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path, LogOverrides::default())?;
    runner.log_startup("scan");
    let config = runner.mount_config(args.target.overrides(), None)?;

    println!(
        "Scanning {} for {} subtitles...",
        config.root().display(),
        config.language()
    );

    let summary = runner.block_on(async {
        std::fs::create_dir_all(config.tmp_dir()).map_err(|e| CliError::Cache(e.into()))?;
        let demuxer = MkvToolnixDemuxer::locate(
            config.tmp_dir(),
            config.extraction_timeout(),
            Arc::new(TracingLogger::new("demuxer")),
        )?;
        let cache = Arc::new(CacheStore::new(
            config.clone(),
            Arc::new(demuxer),
            Arc::new(TracingLogger::new("cache")),
        ));
        let mut coordinator = ExtractionCoordinator::new(
            config.clone(),
            cache.clone(),
            Arc::new(TracingLogger::new("extractor")),
        );

        let summary = coordinator.run_single_pass().await;
        if config.prune_orphans() {
            cache.prune_orphans().await?;
        }
        Ok::<_, CliError>(summary)
    })?;

    println!(
        "{} videos scanned, {} extracted, {} failed",
        summary.videos, summary.extracted, summary.failed
    );
    Ok(())
}
