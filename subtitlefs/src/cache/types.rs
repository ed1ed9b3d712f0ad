//! Cache key, error and statistics types.

use crate::demux::DemuxError;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Identifies the set of cached subtitles for one video in one language.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    video: PathBuf,
    language: String,
}

impl CacheKey {
    /// `video` must be absolute.
    pub fn new(video: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            video: video.into(),
            language: language.into(),
        }
    }

    pub fn video(&self) -> &Path {
        &self.video
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.video.display(), self.language)
    }
}

/// Errors from cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// No valid entry exists, and none could be produced.
    #[error("no cached {ext} subtitle for {key}")]
    NotCached { key: CacheKey, ext: String },

    #[error("source video {} is missing", .0.display())]
    VideoMissing(PathBuf),

    #[error("cannot derive a cache path for {}", .0.display())]
    InvalidKey(PathBuf),

    #[error("extraction from {} failed: {source}", video.display())]
    Extraction {
        video: PathBuf,
        #[source]
        source: DemuxError,
    },

    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CacheError {
    /// Whether the error means "this subtitle does not exist" rather than a
    /// fault in the cache itself.
    pub fn is_absence(&self) -> bool {
        matches!(
            self,
            CacheError::NotCached { .. } | CacheError::VideoMissing(_) | CacheError::Extraction { .. }
        )
    }
}

/// Snapshot of cache activity counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// `put` calls that ran the demuxer.
    pub extractions: u64,
    /// `put` calls satisfied by entries another caller had just written.
    pub reused: u64,
    /// Subtitle files written.
    pub files_written: u64,
    /// `put` calls that failed.
    pub failures: u64,
}

/// Outcome of an orphan sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    pub files_removed: usize,
    pub dirs_removed: usize,
}
