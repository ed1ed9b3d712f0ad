//! Container introspection and track extraction.
//!
//! The overlay never parses containers itself. It asks a [`Demuxer`] for a
//! video's track list and for the raw bytes of one track. Production mounts
//! use [`MkvToolnixDemuxer`]; tests use [`MockDemuxer`].

mod mkvtoolnix;
mod mock;
mod process;

pub use mkvtoolnix::MkvToolnixDemuxer;
pub use mock::MockDemuxer;

use serde::Deserialize;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Boxed future returned by [`Demuxer`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors raised by a demuxer.
#[derive(Debug, Error)]
pub enum DemuxError {
    #[error("required tool '{tool}' not found in PATH: {source}")]
    ToolNotFound {
        tool: &'static str,
        #[source]
        source: which::Error,
    },

    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{tool} did not finish within {timeout:?}")]
    Timeout {
        tool: &'static str,
        timeout: Duration,
    },

    #[error("{tool} failed ({status}): {stderr}")]
    Failed {
        tool: &'static str,
        status: String,
        stderr: String,
    },

    #[error("unexpected output from {tool}: {reason}")]
    MalformedOutput { tool: &'static str, reason: String },

    #[error("track {index} not found in {}", video.display())]
    NoSuchTrack { video: PathBuf, index: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Kind of stream a container track carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Subtitles,
    #[serde(other)]
    Other,
}

/// One track as reported by [`Demuxer::list_tracks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    /// Track index used to address the track when extracting.
    pub index: u32,
    pub kind: TrackKind,
    /// Container codec identifier, e.g. `S_TEXT/UTF8`.
    pub codec_id: String,
    /// Three-letter language code; `und` when the container has none.
    pub language: String,
}

impl TrackInfo {
    pub fn new(
        index: u32,
        kind: TrackKind,
        codec_id: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            index,
            kind,
            codec_id: codec_id.into(),
            language: language.into(),
        }
    }

    /// Shorthand for a subtitle track.
    pub fn subtitle(index: u32, codec_id: impl Into<String>, language: impl Into<String>) -> Self {
        Self::new(index, TrackKind::Subtitles, codec_id, language)
    }

    pub fn is_subtitle(&self) -> bool {
        self.kind == TrackKind::Subtitles
    }

    /// Case-insensitive language match.
    pub fn is_language(&self, language: &str) -> bool {
        self.language.eq_ignore_ascii_case(language)
    }
}

/// Lists and extracts the tracks of a video container.
///
/// Both operations may block for as long as the underlying tool runs;
/// implementations must bound that time and clean up after themselves.
pub trait Demuxer: Send + Sync {
    /// Tracks of `video`, in container order.
    fn list_tracks<'a>(&'a self, video: &'a Path)
        -> BoxFuture<'a, Result<Vec<TrackInfo>, DemuxError>>;

    /// Raw bytes of track `index` of `video`.
    fn extract_track<'a>(
        &'a self,
        video: &'a Path,
        index: u32,
    ) -> BoxFuture<'a, Result<Vec<u8>, DemuxError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_kind_deserialize() {
        let kinds: Vec<TrackKind> =
            serde_json::from_str(r#"["video", "audio", "subtitles", "buttons"]"#).unwrap();
        assert_eq!(
            kinds,
            vec![
                TrackKind::Video,
                TrackKind::Audio,
                TrackKind::Subtitles,
                TrackKind::Other
            ]
        );
    }

    #[test]
    fn test_track_info_helpers() {
        let track = TrackInfo::subtitle(2, "S_TEXT/ASS", "ENG");
        assert!(track.is_subtitle());
        assert!(track.is_language("eng"));
        assert!(!track.is_language("fre"));

        let audio = TrackInfo::new(1, TrackKind::Audio, "A_AAC", "eng");
        assert!(!audio.is_subtitle());
    }

    #[test]
    fn test_demux_error_messages() {
        let err = DemuxError::Timeout {
            tool: "mkvextract",
            timeout: Duration::from_secs(5),
        };
        assert!(err.to_string().contains("mkvextract"));

        let err = DemuxError::NoSuchTrack {
            video: PathBuf::from("/v/movie.mkv"),
            index: 4,
        };
        assert_eq!(err.to_string(), "track 4 not found in /v/movie.mkv");
    }
}
