//! MKVToolNix-backed demuxer.
//!
//! Track listing uses `mkvmerge`'s JSON identification output; extraction
//! runs `mkvextract` into a scratch file that is removed afterwards.

use super::process::{self, ProcessOutput};
use super::{BoxFuture, DemuxError, Demuxer, TrackInfo, TrackKind};
use crate::config::MountConfig;
use crate::log::Logger;
use crate::{log_debug, log_trace, log_warn};
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

const MKVMERGE: &str = "mkvmerge";
const MKVEXTRACT: &str = "mkvextract";

/// Exit codes mkvextract uses for success and success-with-warnings.
const MKVEXTRACT_OK: &[i32] = &[0, 1];

#[derive(Debug, Deserialize)]
struct Identification {
    #[serde(default)]
    tracks: Vec<IdentifiedTrack>,
}

#[derive(Debug, Deserialize)]
struct IdentifiedTrack {
    id: u32,
    #[serde(rename = "type")]
    kind: TrackKind,
    #[serde(default)]
    properties: TrackProperties,
}

#[derive(Debug, Default, Deserialize)]
struct TrackProperties {
    #[serde(default)]
    codec_id: Option<String>,
    #[serde(default)]
    language: Option<String>,
}

/// [`Demuxer`] that shells out to `mkvmerge` and `mkvextract`.
pub struct MkvToolnixDemuxer {
    mkvmerge: PathBuf,
    mkvextract: PathBuf,
    scratch_dir: PathBuf,
    timeout: Duration,
    logger: Arc<dyn Logger>,
}

impl MkvToolnixDemuxer {
    /// Locate both tools in `PATH`.
    ///
    /// Scratch files for extraction are created under `scratch_dir`; each
    /// tool invocation is killed after `timeout`.
    pub fn locate(
        scratch_dir: impl Into<PathBuf>,
        timeout: Duration,
        logger: Arc<dyn Logger>,
    ) -> Result<Self, DemuxError> {
        let mkvmerge = which::which(MKVMERGE).map_err(|source| DemuxError::ToolNotFound {
            tool: MKVMERGE,
            source,
        })?;
        let mkvextract = which::which(MKVEXTRACT).map_err(|source| DemuxError::ToolNotFound {
            tool: MKVEXTRACT,
            source,
        })?;
        log_debug!(
            logger,
            "Using {} and {}",
            mkvmerge.display(),
            mkvextract.display()
        );
        Ok(Self::with_tools(
            mkvmerge,
            mkvextract,
            scratch_dir,
            timeout,
            logger,
        ))
    }

    /// Locate the tools for a mount.
    ///
    /// A cache-only mount may run without them: lookups of uncached
    /// subtitles then fail to spawn and report the subtitle as missing.
    pub fn for_mount(config: &MountConfig, logger: Arc<dyn Logger>) -> Result<Self, DemuxError> {
        match Self::locate(config.tmp_dir(), config.extraction_timeout(), logger.clone()) {
            Ok(demuxer) => Ok(demuxer),
            Err(e) if config.cache_only() => {
                log_warn!(logger, "{}; serving existing cache entries only", e);
                Ok(Self::with_tools(
                    MKVMERGE,
                    MKVEXTRACT,
                    config.tmp_dir(),
                    config.extraction_timeout(),
                    logger,
                ))
            }
            Err(e) => Err(e),
        }
    }

    /// Use explicit tool paths.
    pub fn with_tools(
        mkvmerge: impl Into<PathBuf>,
        mkvextract: impl Into<PathBuf>,
        scratch_dir: impl Into<PathBuf>,
        timeout: Duration,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            mkvmerge: mkvmerge.into(),
            mkvextract: mkvextract.into(),
            scratch_dir: scratch_dir.into(),
            timeout,
            logger,
        }
    }

    /// Decode `mkvmerge -J` output into track descriptions.
    pub fn parse_identification(json: &[u8]) -> Result<Vec<TrackInfo>, DemuxError> {
        let identification: Identification =
            serde_json::from_slice(json).map_err(|e| DemuxError::MalformedOutput {
                tool: MKVMERGE,
                reason: e.to_string(),
            })?;

        Ok(identification
            .tracks
            .into_iter()
            .map(|track| TrackInfo {
                index: track.id,
                kind: track.kind,
                codec_id: track.properties.codec_id.unwrap_or_default(),
                language: track
                    .properties
                    .language
                    .filter(|lang| !lang.is_empty())
                    .unwrap_or_else(|| "und".to_string()),
            })
            .collect())
    }

    async fn identify(&self, video: &Path) -> Result<Vec<TrackInfo>, DemuxError> {
        let mut command = Command::new(&self.mkvmerge);
        command
            .arg("--identification-format")
            .arg("json")
            .arg("--identify")
            .arg(video);

        let output: ProcessOutput =
            process::run(command, MKVMERGE, self.timeout, self.logger.as_ref())
                .await?
                .check(MKVMERGE, &[0])?;
        let tracks = Self::parse_identification(&output.stdout)?;
        log_trace!(
            self.logger,
            "{} has {} tracks",
            video.display(),
            tracks.len()
        );
        Ok(tracks)
    }

    async fn extract(&self, video: &Path, index: u32) -> Result<Vec<u8>, DemuxError> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("track-")
            .tempfile_in(&self.scratch_dir)?;

        let mut target = OsString::from(format!("{index}:"));
        target.push(scratch.path());

        let mut command = Command::new(&self.mkvextract);
        command.arg(video).arg("tracks").arg(target);

        process::run(command, MKVEXTRACT, self.timeout, self.logger.as_ref())
            .await?
            .check(MKVEXTRACT, MKVEXTRACT_OK)?;

        let data = tokio::fs::read(scratch.path()).await?;
        log_debug!(
            self.logger,
            "Extracted track {} of {} ({} bytes)",
            index,
            video.display(),
            data.len()
        );
        Ok(data)
    }
}

impl Demuxer for MkvToolnixDemuxer {
    fn list_tracks<'a>(
        &'a self,
        video: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<TrackInfo>, DemuxError>> {
        Box::pin(self.identify(video))
    }

    fn extract_track<'a>(
        &'a self,
        video: &'a Path,
        index: u32,
    ) -> BoxFuture<'a, Result<Vec<u8>, DemuxError>> {
        Box::pin(self.extract(video, index))
    }
}
