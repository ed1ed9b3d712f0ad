//! subtitlefs CLI - mount and maintain the subtitle overlay filesystem.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::cache::CacheAction;
use commands::mount::MountArgs;
use commands::scan::ScanArgs;
use commands::tracks::TracksArgs;

#[derive(Parser)]
#[command(name = "subtitlefs")]
#[command(version, about = "Expose subtitles embedded in MKV files as sibling files", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.subtitlefs/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount the overlay and serve it until unmounted
    Mount(MountArgs),
    /// Extract subtitles for every stale video once, without mounting
    Scan(ScanArgs),
    /// Cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// List the tracks of a video
    Tracks(TracksArgs),
}

fn main() {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Mount(args) => commands::mount::run(args, config),
        Commands::Scan(args) => commands::scan::run(args, config),
        Commands::Cache { action } => commands::cache::run(action, config),
        Commands::Tracks(args) => commands::tracks::run(args, config),
    };

    if let Err(e) = result {
        e.exit();
    }
}
