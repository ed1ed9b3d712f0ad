//! Path classification.
//!
//! A path under the mount is one of:
//!
//! - **Passthrough**: a real file or directory exists in the source tree
//! - **VirtualSubtitle**: no real file, but the name carries a subtitle
//!   extension and exactly one sibling video's name starts with its base name
//! - **NotFound**: anything else
//!
//! Several candidate videos for one subtitle name are reported as
//! [`ResolveError::AmbiguousMatch`] instead of picking one. That includes
//! `movie.mkv` next to `movie-extended.mkv`: both start with `movie`.

use crate::config::MountConfig;
use crate::log::Logger;
use crate::log_trace;
use crate::subtitle::{extension_of, is_subtitle_extension, is_video_extension};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Outcome of resolving a mount-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Serve the real file at this absolute path.
    Passthrough(PathBuf),
    /// Synthesize the `ext` subtitle of `video`.
    VirtualSubtitle { video: PathBuf, ext: String },
    NotFound,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{} matches more than one video: {candidates:?}", path.display())]
    AmbiguousMatch {
        path: PathBuf,
        candidates: Vec<PathBuf>,
    },

    #[error("I/O error while resolving: {0}")]
    Io(#[from] io::Error),
}

/// Classifies mount-relative paths against the source tree.
///
/// Stateless apart from its configuration; safe to share across tasks.
pub struct PathResolver {
    config: Arc<MountConfig>,
    logger: Arc<dyn Logger>,
}

impl PathResolver {
    pub fn new(config: Arc<MountConfig>, logger: Arc<dyn Logger>) -> Self {
        Self { config, logger }
    }

    /// Absolute source path for a mount-relative path.
    ///
    /// A leading `/` is accepted. Paths that would escape the root (`..`)
    /// have no source path.
    pub fn source_path(&self, relative: &Path) -> Option<PathBuf> {
        let mut path = self.config.root().to_path_buf();
        for component in relative.components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => return None,
            }
        }
        Some(path)
    }

    /// Classify `relative`.
    pub async fn resolve(&self, relative: &Path) -> Result<Resolution, ResolveError> {
        let Some(real) = self.source_path(relative) else {
            return Ok(Resolution::NotFound);
        };

        if tokio::fs::metadata(&real).await.is_ok() {
            log_trace!(self.logger, "{} is a real file", relative.display());
            return Ok(Resolution::Passthrough(real));
        }

        let Some(ext) = extension_of(&real).filter(|ext| is_subtitle_extension(ext)) else {
            return Ok(Resolution::NotFound);
        };
        let (Some(parent), Some(base)) = (real.parent(), real.file_stem().and_then(|s| s.to_str()))
        else {
            return Ok(Resolution::NotFound);
        };

        let mut candidates = video_candidates(parent, base).await?;
        match candidates.len() {
            0 => Ok(Resolution::NotFound),
            1 => {
                let video = candidates.remove(0);
                log_trace!(
                    self.logger,
                    "{} is a virtual subtitle of {}",
                    relative.display(),
                    video.display()
                );
                Ok(Resolution::VirtualSubtitle { video, ext })
            }
            _ => {
                candidates.sort();
                Err(ResolveError::AmbiguousMatch {
                    path: relative.to_path_buf(),
                    candidates,
                })
            }
        }
    }
}

/// Files in `dir` whose name starts with `base` and has a video extension
/// among the dot-separated segments after the first dot.
async fn video_candidates(dir: &Path, base: &str) -> Result<Vec<PathBuf>, ResolveError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e)
            if e.kind() == io::ErrorKind::NotFound || e.raw_os_error() == Some(libc::ENOTDIR) =>
        {
            return Ok(Vec::new())
        }
        Err(e) => return Err(e.into()),
    };

    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(rest) = name.to_str().and_then(|n| n.strip_prefix(base)) else {
            continue;
        };
        if !rest.split('.').skip(1).any(is_video_extension) {
            continue;
        }
        if entry.file_type().await.is_ok_and(|t| !t.is_dir()) {
            candidates.push(entry.path());
        }
    }
    Ok(candidates)
}
