//! The filesystem operation contract, expressed over mount-relative paths.
//!
//! [`SubtitleFs`] owns every core component and answers
//! getattr/readdir/open/read/write/release/fsync/mknod plus the mount
//! lifecycle hooks. It keeps no per-path state of its own; the host adapter
//! in [`crate::fuse`] only translates inodes to paths and errors to errnos.

use crate::cache::{CacheError, CacheStore};
use crate::config::MountConfig;
use crate::coordinator::{
    CoordinatorHandle, CoordinatorStats, ExtractionCoordinator, ImmediateQueue,
};
use crate::demux::Demuxer;
use crate::handle::{FileHandleMultiplexer, HandleError};
use crate::log::{Logger, TracingLogger};
use crate::resolver::{PathResolver, Resolution, ResolveError};
use crate::subtitle::{is_video_path, SubtitleFormat};
use crate::{log_debug, log_error, log_info, log_warn};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors surfaced at the operation boundary, one errno each.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),

    #[error("{} matches more than one video: {candidates:?}", path.display())]
    Ambiguous {
        path: PathBuf,
        candidates: Vec<PathBuf>,
    },

    #[error("read-only filesystem")]
    ReadOnly,

    #[error("bad file handle {0}")]
    BadHandle(u64),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FsError {
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::Ambiguous { .. } => libc::EINVAL,
            FsError::ReadOnly => libc::EROFS,
            FsError::BadHandle(_) => libc::EBADF,
            FsError::NotADirectory(_) => libc::ENOTDIR,
            FsError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

impl From<ResolveError> for FsError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::AmbiguousMatch { path, candidates } => {
                FsError::Ambiguous { path, candidates }
            }
            ResolveError::Io(e) => FsError::Io(e),
        }
    }
}

impl From<HandleError> for FsError {
    fn from(e: HandleError) -> Self {
        match e {
            HandleError::NotFound(path) => FsError::NotFound(path),
            HandleError::ReadOnlyViolation(_) => FsError::ReadOnly,
            HandleError::BadHandle(fh) => FsError::BadHandle(fh),
            HandleError::Resolve(e) => e.into(),
            HandleError::Cache(e) => cache_failure(e),
            HandleError::Io(e) => FsError::Io(e),
        }
    }
}

fn cache_failure(e: CacheError) -> FsError {
    match e {
        CacheError::Io(e) => FsError::Io(e),
        other => FsError::Io(io::Error::other(other.to_string())),
    }
}

/// Where a stat came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrigin {
    /// A file or directory in the source tree.
    Source,
    /// A fresh cache entry.
    Cache,
    /// The video's stat, sized to the just-extracted subtitle.
    Video,
}

/// Result of [`SubtitleFs::getattr`].
#[derive(Debug, Clone)]
pub struct EntryStat {
    pub metadata: Metadata,
    /// Size to report; differs from `metadata.len()` for [`EntryOrigin::Video`].
    pub size: u64,
    pub origin: EntryOrigin,
}

impl EntryStat {
    pub fn is_synthetic(&self) -> bool {
        self.origin != EntryOrigin::Source
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
}

/// One name yielded by [`SubtitleFs::readdir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: OsString,
    pub kind: EntryKind,
    pub synthetic: bool,
}

enum CoordinatorSlot {
    Idle(ExtractionCoordinator),
    Running(CoordinatorHandle),
    Stopped,
}

pub struct SubtitleFs {
    config: Arc<MountConfig>,
    resolver: Arc<PathResolver>,
    cache: Arc<CacheStore>,
    handles: FileHandleMultiplexer,
    queue: ImmediateQueue,
    coordinator: Mutex<CoordinatorSlot>,
    logger: Arc<dyn Logger>,
}

impl SubtitleFs {
    /// Build every component from `config`, each with its own tracing
    /// component name.
    pub fn new(config: Arc<MountConfig>, demuxer: Arc<dyn Demuxer>) -> Self {
        Self::assemble(config, demuxer, |component| {
            Arc::new(TracingLogger::new(component)) as Arc<dyn Logger>
        })
    }

    /// Build every component sharing one logger.
    pub fn with_logger(
        config: Arc<MountConfig>,
        demuxer: Arc<dyn Demuxer>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self::assemble(config, demuxer, |_| logger.clone())
    }

    fn assemble(
        config: Arc<MountConfig>,
        demuxer: Arc<dyn Demuxer>,
        logger_for: impl Fn(&'static str) -> Arc<dyn Logger>,
    ) -> Self {
        let resolver = Arc::new(PathResolver::new(config.clone(), logger_for("resolver")));
        let cache = Arc::new(CacheStore::new(config.clone(), demuxer, logger_for("cache")));
        let handles =
            FileHandleMultiplexer::new(resolver.clone(), cache.clone(), logger_for("handles"));
        let coordinator =
            ExtractionCoordinator::new(config.clone(), cache.clone(), logger_for("extractor"));

        Self {
            queue: coordinator.queue(),
            coordinator: Mutex::new(CoordinatorSlot::Idle(coordinator)),
            config,
            resolver,
            cache,
            handles,
            logger: logger_for("filesystem"),
        }
    }

    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Prepare the cache directory and start background extraction.
    ///
    /// An unusable cache directory is the one fatal condition.
    pub async fn on_mount_start(&self) -> Result<(), FsError> {
        if let Err(e) = tokio::fs::create_dir_all(self.config.tmp_dir()).await {
            log_error!(
                self.logger,
                "Cannot create cache directory {}: {}",
                self.config.cache_dir().display(),
                e
            );
            return Err(e.into());
        }

        if self.config.cache_only() {
            log_info!(self.logger, "Cache-only mode, background extraction disabled");
            return Ok(());
        }

        let mut slot = self.coordinator.lock().await;
        *slot = match std::mem::replace(&mut *slot, CoordinatorSlot::Stopped) {
            CoordinatorSlot::Idle(coordinator) => CoordinatorSlot::Running(coordinator.spawn()),
            other => other,
        };
        Ok(())
    }

    /// Stop background extraction and wait for it to wind down.
    pub async fn on_mount_stop(&self) {
        let mut slot = self.coordinator.lock().await;
        if let CoordinatorSlot::Running(handle) =
            std::mem::replace(&mut *slot, CoordinatorSlot::Stopped)
        {
            let stats = handle.stats();
            handle.stop().await;
            log_info!(
                self.logger,
                "Background extraction stopped after {} passes ({} extractions, {} failures)",
                stats.passes_completed,
                stats.extractions,
                stats.failures
            );
        }
        self.cache.gate().log_stats();
    }

    pub async fn coordinator_stats(&self) -> Option<CoordinatorStats> {
        match &*self.coordinator.lock().await {
            CoordinatorSlot::Running(handle) => Some(handle.stats()),
            _ => None,
        }
    }

    /// Stat a path: source file, fresh cache entry, or a virtual subtitle
    /// extracted on the spot to learn its size.
    pub async fn getattr(&self, path: &Path) -> Result<EntryStat, FsError> {
        let (video, ext) = match self.resolver.resolve(path).await? {
            Resolution::Passthrough(source) => {
                let metadata = tokio::fs::metadata(&source).await?;
                return Ok(EntryStat {
                    size: metadata.len(),
                    metadata,
                    origin: EntryOrigin::Source,
                });
            }
            Resolution::VirtualSubtitle { video, ext } => (video, ext),
            Resolution::NotFound => return Err(FsError::NotFound(path.to_path_buf())),
        };

        let key = self.cache.key(&video);
        if let Some((_, metadata)) = self.cache.valid_entry(&key, &ext).await.map_err(cache_failure)? {
            return Ok(EntryStat {
                size: metadata.len(),
                metadata,
                origin: EntryOrigin::Cache,
            });
        }

        let (_, entry) = self.cache.ensure(&key, &ext).await.map_err(|e| {
            if e.is_absence() {
                FsError::NotFound(path.to_path_buf())
            } else {
                cache_failure(e)
            }
        })?;
        let metadata = tokio::fs::metadata(&video).await?;
        Ok(EntryStat {
            metadata,
            size: entry.len(),
            origin: EntryOrigin::Video,
        })
    }

    /// List a source directory with the subtitles its videos can provide.
    ///
    /// The returned stream reads the directory lazily and yields each name
    /// once; entries before `offset` are skipped.
    pub async fn readdir(
        &self,
        path: &Path,
        offset: usize,
    ) -> Result<BoxStream<'_, Result<DirEntry, FsError>>, FsError> {
        let dir = self
            .resolver
            .source_path(path)
            .ok_or_else(|| FsError::NotFound(path.to_path_buf()))?;
        let metadata = match tokio::fs::metadata(&dir).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FsError::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_dir() {
            return Err(FsError::NotADirectory(path.to_path_buf()));
        }

        let listing = Listing {
            fs: self,
            entries: tokio::fs::read_dir(&dir).await?,
            dir,
            pending: VecDeque::new(),
            failed: false,
        };
        Ok(stream::unfold(listing, Listing::next)
            .skip(offset)
            .boxed())
    }

    pub async fn open(&self, path: &Path, flags: i32) -> Result<u64, FsError> {
        Ok(self.handles.open(path, flags).await?)
    }

    pub async fn read(&self, fh: u64, offset: u64, size: u32) -> Result<Vec<u8>, FsError> {
        Ok(self.handles.read(fh, offset, size).await?)
    }

    pub fn release(&self, fh: u64) -> Result<(), FsError> {
        Ok(self.handles.release(fh)?)
    }

    pub async fn fsync(&self, fh: u64, datasync: bool) -> Result<(), FsError> {
        Ok(self.handles.fsync(fh, datasync).await?)
    }

    /// Writes are never performed through the mount.
    pub fn write(&self, path: &Path, _offset: u64, _data: &[u8]) -> Result<u32, FsError> {
        log_debug!(self.logger, "Rejected write to {}", path.display());
        Err(FsError::ReadOnly)
    }

    pub fn mknod(&self, path: &Path, _mode: u32) -> Result<(), FsError> {
        log_debug!(self.logger, "Rejected mknod of {}", path.display());
        Err(FsError::ReadOnly)
    }

    pub fn open_handles(&self) -> usize {
        self.handles.open_count()
    }

    /// Formats `video` offers, asking the coordinator to fill any that are
    /// not cached yet.
    async fn offered_formats(&self, video: &Path) -> Result<Vec<SubtitleFormat>, CacheError> {
        let formats = self.cache.available_formats(video).await?;
        if !formats.is_empty()
            && !self.config.cache_only()
            && !self.cache.is_complete(&self.cache.key(video)).await
        {
            self.queue.request(video.to_path_buf());
        }
        Ok(formats)
    }
}

/// State of one lazy directory listing.
struct Listing<'a> {
    fs: &'a SubtitleFs,
    dir: PathBuf,
    entries: tokio::fs::ReadDir,
    pending: VecDeque<DirEntry>,
    failed: bool,
}

impl<'a> Listing<'a> {
    async fn next(mut self) -> Option<(Result<DirEntry, FsError>, Self)> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Some((Ok(entry), self));
            }
            if self.failed {
                return None;
            }

            match self.entries.next_entry().await {
                Ok(Some(entry)) => self.expand(entry).await,
                Ok(None) => return None,
                Err(e) => {
                    self.failed = true;
                    return Some((Err(e.into()), self));
                }
            }
        }
    }

    /// Queue the real entry and any subtitles it implies.
    async fn expand(&mut self, entry: tokio::fs::DirEntry) {
        let path = entry.path();
        let kind = match entry.file_type().await {
            Ok(t) if t.is_dir() => EntryKind::Directory,
            Ok(t) if t.is_symlink() => EntryKind::Symlink,
            Ok(_) => EntryKind::File,
            Err(e) => {
                log_debug!(self.fs.logger, "Skipping {}: {}", path.display(), e);
                return;
            }
        };
        self.pending.push_back(DirEntry {
            name: entry.file_name(),
            kind,
            synthetic: false,
        });

        if kind == EntryKind::Directory || !is_video_path(&path) {
            return;
        }
        let Some(stem) = path.file_stem().map(|s| s.to_os_string()) else {
            return;
        };

        let formats = match self.fs.offered_formats(&path).await {
            Ok(formats) => formats,
            Err(e) => {
                log_warn!(self.fs.logger, "Cannot list subtitles of {}: {}", path.display(), e);
                return;
            }
        };
        for format in formats {
            let mut name = stem.clone();
            name.push(".");
            name.push(format.extension());
            if tokio::fs::symlink_metadata(self.dir.join(&name)).await.is_ok() {
                continue;
            }
            self.pending.push_back(DirEntry {
                name,
                kind: EntryKind::File,
                synthetic: true,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::{MockDemuxer, TrackInfo};
    use crate::log::NoOpLogger;
    use tempfile::TempDir;

    struct Fixture {
        root: TempDir,
        _cache: TempDir,
        demuxer: Arc<MockDemuxer>,
        fs: SubtitleFs,
    }

    fn fixture_with(cache_only: bool) -> Fixture {
        let root = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let config = Arc::new(
            MountConfig::builder(root.path())
                .cache_dir(cache_dir.path().join("cache"))
                .cache_only(cache_only)
                .build()
                .unwrap(),
        );
        let demuxer = Arc::new(MockDemuxer::new());
        let fs = SubtitleFs::with_logger(config, demuxer.clone(), Arc::new(NoOpLogger));
        Fixture {
            root,
            _cache: cache_dir,
            demuxer,
            fs,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(true)
    }

    impl Fixture {
        fn video(&self, name: &str, tracks: &[(u32, &str, &str, &str)]) -> PathBuf {
            let path = self.root.path().join(name);
            std::fs::write(&path, b"matroska").unwrap();
            for (index, codec, lang, data) in tracks {
                self.demuxer
                    .add_track(&path, TrackInfo::subtitle(*index, *codec, *lang), *data);
            }
            path
        }

        async fn names(&self, dir: &str) -> Vec<(String, bool)> {
            let mut names: Vec<_> = self
                .fs
                .readdir(Path::new(dir), 0)
                .await
                .unwrap()
                .map(|entry| {
                    let entry = entry.unwrap();
                    (entry.name.to_string_lossy().into_owned(), entry.synthetic)
                })
                .collect()
                .await;
            names.sort();
            names
        }
    }

    #[test]
    fn test_errno_mapping() {
        assert_eq!(FsError::NotFound(PathBuf::from("a")).errno(), libc::ENOENT);
        assert_eq!(
            FsError::Ambiguous {
                path: PathBuf::from("a"),
                candidates: vec![]
            }
            .errno(),
            libc::EINVAL
        );
        assert_eq!(FsError::ReadOnly.errno(), libc::EROFS);
        assert_eq!(FsError::BadHandle(3).errno(), libc::EBADF);
        assert_eq!(FsError::NotADirectory(PathBuf::from("a")).errno(), libc::ENOTDIR);
        assert_eq!(
            FsError::Io(io::Error::from_raw_os_error(libc::EACCES)).errno(),
            libc::EACCES
        );
        assert_eq!(FsError::Io(io::Error::other("x")).errno(), libc::EIO);
    }

    #[tokio::test]
    async fn test_getattr_real_file() {
        let fx = fixture();
        std::fs::write(fx.root.path().join("notes.txt"), b"12345").unwrap();

        let stat = fx.fs.getattr(Path::new("/notes.txt")).await.unwrap();
        assert_eq!(stat.size, 5);
        assert_eq!(stat.origin, EntryOrigin::Source);
        assert!(!stat.is_synthetic());
    }

    #[tokio::test]
    async fn test_getattr_virtual_extracts_then_hits_cache() {
        let fx = fixture();
        fx.video("movie.mkv", &[(0, "S_TEXT/UTF8", "eng", "subtitle!")]);

        let first = fx.fs.getattr(Path::new("movie.srt")).await.unwrap();
        assert_eq!(first.origin, EntryOrigin::Video);
        assert_eq!(first.size, 9);

        let second = fx.fs.getattr(Path::new("movie.srt")).await.unwrap();
        assert_eq!(second.origin, EntryOrigin::Cache);
        assert_eq!(second.size, 9);
        assert_eq!(fx.demuxer.extract_calls(), 1);
    }

    #[tokio::test]
    async fn test_getattr_missing() {
        let fx = fixture();
        fx.video("movie.mkv", &[(0, "S_TEXT/UTF8", "eng", "x")]);

        let err = fx.fs.getattr(Path::new("movie.ass")).await.unwrap_err();
        assert_eq!(err.errno(), libc::ENOENT);
        let err = fx.fs.getattr(Path::new("other.srt")).await.unwrap_err();
        assert_eq!(err.errno(), libc::ENOENT);
    }

    #[tokio::test]
    async fn test_getattr_demux_failure_is_not_found() {
        let fx = fixture();
        let video = fx.video("movie.mkv", &[(0, "S_TEXT/UTF8", "eng", "x")]);
        fx.demuxer.set_failing(&video, true);

        let err = fx.fs.getattr(Path::new("movie.srt")).await.unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_readdir_adds_subtitles_for_videos() {
        let fx = fixture();
        fx.video(
            "movie.mkv",
            &[
                (0, "S_TEXT/ASS", "eng", "ass"),
                (1, "S_TEXT/UTF8", "fre", "srt"),
                (2, "S_VOBSUB", "eng", "vob"),
            ],
        );
        std::fs::create_dir(fx.root.path().join("extras")).unwrap();

        assert_eq!(
            fx.names("/").await,
            vec![
                ("extras".to_string(), false),
                ("movie.ass".to_string(), true),
                ("movie.mkv".to_string(), false),
            ]
        );
        assert_eq!(fx.demuxer.extract_calls(), 0);
    }

    #[tokio::test]
    async fn test_readdir_does_not_duplicate_real_subtitles() {
        let fx = fixture();
        fx.video(
            "movie.mkv",
            &[(0, "S_TEXT/UTF8", "eng", "srt"), (1, "S_TEXT/ASS", "eng", "ass")],
        );
        std::fs::write(fx.root.path().join("movie.srt"), b"mine").unwrap();

        assert_eq!(
            fx.names("").await,
            vec![
                ("movie.ass".to_string(), true),
                ("movie.mkv".to_string(), false),
                ("movie.srt".to_string(), false),
            ]
        );
    }

    #[tokio::test]
    async fn test_readdir_skips_failing_videos() {
        let fx = fixture();
        let bad = fx.video("bad.mkv", &[(0, "S_TEXT/UTF8", "eng", "x")]);
        fx.video("good.mkv", &[(0, "S_TEXT/UTF8", "eng", "y")]);
        fx.demuxer.set_failing(&bad, true);

        assert_eq!(
            fx.names("/").await,
            vec![
                ("bad.mkv".to_string(), false),
                ("good.mkv".to_string(), false),
                ("good.srt".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn test_readdir_offset_and_errors() {
        let fx = fixture();
        std::fs::write(fx.root.path().join("a.txt"), b"a").unwrap();
        std::fs::write(fx.root.path().join("b.txt"), b"b").unwrap();

        let all: Vec<_> = fx.fs.readdir(Path::new("/"), 0).await.unwrap().collect().await;
        let rest: Vec<_> = fx.fs.readdir(Path::new("/"), 1).await.unwrap().collect().await;
        assert_eq!(all.len(), 2);
        assert_eq!(rest.len(), 1);

        assert!(matches!(
            fx.fs.readdir(Path::new("a.txt"), 0).await.map(|_| ()),
            Err(FsError::NotADirectory(_))
        ));
        assert!(matches!(
            fx.fs.readdir(Path::new("missing"), 0).await.map(|_| ()),
            Err(FsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_paged_readdir_lists_each_video_once() {
        let fx = fixture();
        for name in ["a.mkv", "b.mkv", "c.mkv", "d.mkv"] {
            fx.video(name, &[(0, "S_TEXT/UTF8", "eng", "x")]);
        }

        let mut seen = Vec::new();
        for offset in (0..).step_by(2) {
            let page: Vec<_> = fx
                .fs
                .readdir(Path::new("/"), offset)
                .await
                .unwrap()
                .take(2)
                .collect()
                .await;
            if page.is_empty() {
                break;
            }
            seen.extend(page.into_iter().map(|entry| entry.unwrap().name));
        }

        assert_eq!(seen.len(), 8);
        assert_eq!(fx.demuxer.list_calls(), 4);
        assert_eq!(fx.demuxer.extract_calls(), 0);
    }

    #[tokio::test]
    async fn test_readdir_keeps_formats_after_partial_failure() {
        let fx = fixture();
        let video = fx.video(
            "movie.mkv",
            &[(0, "S_TEXT/UTF8", "eng", "srt"), (1, "S_TEXT/ASS", "eng", "ass")],
        );
        fx.demuxer.fail_track(&video, 1, 1);

        fx.fs.getattr(Path::new("movie.srt")).await.unwrap();
        assert_eq!(
            fx.names("/").await,
            vec![
                ("movie.ass".to_string(), true),
                ("movie.mkv".to_string(), false),
                ("movie.srt".to_string(), true),
            ]
        );

        let stat = fx.fs.getattr(Path::new("movie.ass")).await.unwrap();
        assert_eq!(stat.origin, EntryOrigin::Video);
        assert_eq!(stat.size, 3);
    }

    #[tokio::test]
    async fn test_write_and_mknod_rejected() {
        let fx = fixture();
        std::fs::write(fx.root.path().join("a.txt"), b"a").unwrap();

        assert_eq!(
            fx.fs.write(Path::new("a.txt"), 0, b"zz").unwrap_err().errno(),
            libc::EROFS
        );
        assert_eq!(fx.fs.mknod(Path::new("new.srt"), 0o644).unwrap_err().errno(), libc::EROFS);
        assert_eq!(std::fs::read(fx.root.path().join("a.txt")).unwrap(), b"a");
        assert!(!fx.root.path().join("new.srt").exists());
    }

    #[tokio::test]
    async fn test_open_read_release() {
        let fx = fixture();
        fx.video("movie.mkv", &[(0, "S_TEXT/SSA", "eng", "[Script Info]")]);

        let fh = fx.fs.open(Path::new("movie.ssa"), libc::O_RDONLY).await.unwrap();
        assert_eq!(fx.fs.read(fh, 0, 1024).await.unwrap(), b"[Script Info]");
        assert_eq!(fx.fs.open_handles(), 1);
        fx.fs.release(fh).unwrap();
        assert_eq!(fx.fs.release(fh).unwrap_err().errno(), libc::EBADF);
    }

    #[tokio::test]
    async fn test_mount_lifecycle_starts_and_stops_coordinator() {
        let fx = fixture_with(false);
        assert!(fx.fs.coordinator_stats().await.is_none());

        fx.fs.on_mount_start().await.unwrap();
        assert!(fx.fs.config().tmp_dir().is_dir());
        assert!(fx.fs.coordinator_stats().await.is_some());

        fx.fs.on_mount_stop().await;
        assert!(fx.fs.coordinator_stats().await.is_none());
    }

    #[tokio::test]
    async fn test_cache_only_mount_has_no_coordinator() {
        let fx = fixture();
        fx.fs.on_mount_start().await.unwrap();
        assert!(fx.fs.config().cache_dir().is_dir());
        assert!(fx.fs.coordinator_stats().await.is_none());
        fx.fs.on_mount_stop().await;
    }
}
