//! Tracks command - show what the demuxer sees in a video.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use subtitlefs::demux::{Demuxer, MkvToolnixDemuxer};
use subtitlefs::log::TracingLogger;
use subtitlefs::subtitle::SubtitleFormat;

use crate::error::CliError;
use crate::runner::{CliRunner, LogOverrides};

#[derive(Debug, Args)]
pub struct TracksArgs {
    /// Video file to inspect
    pub video: PathBuf,

    /// Highlight subtitles in this language (default: from config)
    #[arg(long = "lang")]
    pub language: Option<String>,
}

pub fn run(args: TracksArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path, LogOverrides::default())?;
    let config = runner.config();
    let language = args
        .language
        .unwrap_or_else(|| config.mount.language.clone());

    let demuxer = MkvToolnixDemuxer::locate(
        config.cache.directory.join(".tmp"),
        config.extraction.timeout,
        Arc::new(TracingLogger::new("demuxer")),
    )?;
    let tracks = runner.block_on(demuxer.list_tracks(&args.video))?;

    println!("{}", args.video.display());
    println!("{:>5}  {:<10} {:<16} {:<5} served as", "track", "type", "codec", "lang");
    for track in tracks {
        let served = match SubtitleFormat::from_codec_id(&track.codec_id) {
            Some(format) if track.is_subtitle() && format.is_renderable() => {
                if track.is_language(&language) {
                    format!(".{}", format.extension())
                } else {
                    format!(".{} (other language)", format.extension())
                }
            }
            Some(format) if track.is_subtitle() => format!(".{} (not served)", format.extension()),
            _ => String::from("-"),
        };
        println!(
            "{:>5}  {:<10} {:<16} {:<5} {}",
            track.index,
            format!("{:?}", track.kind).to_lowercase(),
            track.codec_id,
            track.language,
            served
        );
    }
    Ok(())
}
