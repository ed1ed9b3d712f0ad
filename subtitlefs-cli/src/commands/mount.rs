//! Mount command - serve the overlay until unmounted or interrupted.

use std::path::{Path, PathBuf};

use clap::Args;
use subtitlefs::config::MountOptionSet;
use tracing::{info, warn};

use super::common::TargetArgs;
use crate::error::CliError;
use crate::runner::{CliRunner, LogOverrides};

#[derive(Debug, Args)]
pub struct MountArgs {
    /// Where to mount the overlay
    pub mountpoint: PathBuf,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Serve only what is already cached; no background extraction
    #[arg(long)]
    pub cache_only: bool,

    /// Log file
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// Log level or filter directive (e.g. debug, subtitlefs=trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Mount options: root, lang, cachedir, use_cache_only, log, loglevel
    #[arg(short = 'o', value_name = "OPTIONS")]
    pub options: Vec<String>,
}

pub fn run(args: MountArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let options = MountOptionSet::parse(&args.options)?;
    let log = LogOverrides {
        file: args.log.or_else(|| options.log_file.clone()),
        level: args.log_level.or_else(|| options.log_level.clone()),
    };

    let runner = CliRunner::new(config_path, log)?;
    runner.log_startup("mount");
    for option in &options.other {
        warn!("Ignoring unrecognized mount option '{}'", option);
    }

    let mut overrides = args.target.overrides();
    if args.cache_only {
        overrides.cache_only = Some(true);
    }
    let config = runner.mount_config(overrides.or_options(&options), None)?;

    println!("subtitlefs v{}", subtitlefs::VERSION);
    println!("================");
    println!();
    println!("Source:     {}", config.root().display());
    println!("Mountpoint: {}", args.mountpoint.display());
    println!("Language:   {}", config.language());
    println!("Cache:      {}", config.cache_dir().display());
    if config.cache_only() {
        println!("Mode:       cache only (no background extraction)");
    }
    println!();
    println!("Press Ctrl+C to unmount and exit");
    println!();

    runner.block_on(async {
        let mut handle = subtitlefs::fuse::mount(config, &args.mountpoint).await?;

        let interrupted = tokio::select! {
            result = &mut handle => {
                result.map_err(|e| CliError::Mount(subtitlefs::fuse::MountError::MountFailed(e)))?;
                false
            }
            _ = tokio::signal::ctrl_c() => true,
        };

        if interrupted {
            info!("Interrupted, unmounting");
            handle
                .unmount()
                .await
                .map_err(|e| CliError::Mount(subtitlefs::fuse::MountError::MountFailed(e)))?;
        }
        Ok::<(), CliError>(())
    })?;

    println!();
    println!("Filesystem unmounted.");
    Ok(())
}
