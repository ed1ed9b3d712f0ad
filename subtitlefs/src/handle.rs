//! Per-open backing file selection.
//!
//! Every `open` is resolved once: a real source file is opened directly
//! ([`FileHandle::Passthrough`]), a virtual subtitle is made fresh in the
//! cache and the cache file is opened read-only ([`FileHandle::Synthesized`]).
//! Later reads never re-resolve; they go straight to the open file.

use crate::cache::{CacheError, CacheStore};
use crate::log::Logger;
use crate::resolver::{PathResolver, Resolution, ResolveError};
use crate::{log_debug, log_trace};
use dashmap::DashMap;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum HandleError {
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),

    #[error("{} is a read-only subtitle", .0.display())]
    ReadOnlyViolation(PathBuf),

    #[error("unknown file handle {0}")]
    BadHandle(u64),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Cache(CacheError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Access requested by `open(2)` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    pub read: bool,
    pub write: bool,
    pub append: bool,
}

impl OpenMode {
    pub fn from_flags(flags: i32) -> Self {
        let (read, write) = match flags & libc::O_ACCMODE {
            libc::O_WRONLY => (false, true),
            libc::O_RDWR => (true, true),
            _ => (true, false),
        };
        Self {
            read,
            write,
            append: flags & libc::O_APPEND != 0,
        }
    }

    pub fn wants_write(&self) -> bool {
        self.write || self.append
    }

    fn options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options.read(self.read);
        if self.append {
            options.append(true);
        } else {
            options.write(self.write);
        }
        options
    }
}

/// An open file and what it was opened as.
#[derive(Debug)]
pub struct OpenFile {
    file: Mutex<File>,
    path: PathBuf,
    backing: PathBuf,
    writable: bool,
}

impl OpenFile {
    /// Path as requested through the mount.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File actually opened: the source file or the cache entry.
    pub fn backing(&self) -> &Path {
        &self.backing
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }
}

#[derive(Debug)]
pub enum FileHandle {
    Passthrough(OpenFile),
    Synthesized(OpenFile),
}

impl FileHandle {
    pub fn file(&self) -> &OpenFile {
        match self {
            FileHandle::Passthrough(file) | FileHandle::Synthesized(file) => file,
        }
    }

    pub fn is_synthesized(&self) -> bool {
        matches!(self, FileHandle::Synthesized(_))
    }

    /// Read up to `size` bytes at `offset`; shorter only at end of file.
    pub async fn read_at(&self, offset: u64, size: u32) -> io::Result<Vec<u8>> {
        let mut file = self.file().file.lock().await;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut data = Vec::with_capacity(size as usize);
        (&mut *file).take(u64::from(size)).read_to_end(&mut data).await?;
        Ok(data)
    }

    async fn sync(&self, datasync: bool) -> io::Result<()> {
        if !self.file().writable {
            return Ok(());
        }
        let file = self.file().file.lock().await;
        if datasync {
            file.sync_data().await
        } else {
            file.sync_all().await
        }
    }
}

/// Table of open handles keyed by the number handed to the host.
pub struct FileHandleMultiplexer {
    resolver: Arc<PathResolver>,
    cache: Arc<CacheStore>,
    handles: DashMap<u64, Arc<FileHandle>>,
    next_fh: AtomicU64,
    logger: Arc<dyn Logger>,
}

impl FileHandleMultiplexer {
    pub fn new(resolver: Arc<PathResolver>, cache: Arc<CacheStore>, logger: Arc<dyn Logger>) -> Self {
        Self {
            resolver,
            cache,
            handles: DashMap::new(),
            next_fh: AtomicU64::new(1),
            logger,
        }
    }

    /// Open a mount-relative path and return its handle number.
    ///
    /// A stale virtual subtitle is extracted before this returns.
    pub async fn open(&self, relative: &Path, flags: i32) -> Result<u64, HandleError> {
        let mode = OpenMode::from_flags(flags);

        let handle = match self.resolver.resolve(relative).await? {
            Resolution::Passthrough(source) => {
                let file = mode.options().open(&source).await?;
                FileHandle::Passthrough(OpenFile {
                    file: Mutex::new(file),
                    path: relative.to_path_buf(),
                    backing: source,
                    writable: mode.wants_write(),
                })
            }
            Resolution::VirtualSubtitle { video, ext } => {
                if mode.wants_write() {
                    return Err(HandleError::ReadOnlyViolation(relative.to_path_buf()));
                }
                let key = self.cache.key(&video);
                let (entry, _) = self.cache.ensure(&key, &ext).await.map_err(|e| {
                    if e.is_absence() {
                        HandleError::NotFound(relative.to_path_buf())
                    } else {
                        HandleError::Cache(e)
                    }
                })?;
                let file = File::open(&entry).await?;
                FileHandle::Synthesized(OpenFile {
                    file: Mutex::new(file),
                    path: relative.to_path_buf(),
                    backing: entry,
                    writable: false,
                })
            }
            Resolution::NotFound => return Err(HandleError::NotFound(relative.to_path_buf())),
        };

        let fh = self.next_fh.fetch_add(1, Ordering::Relaxed);
        log_debug!(
            self.logger,
            "Opened {} as fh {} ({})",
            relative.display(),
            fh,
            if handle.is_synthesized() { "synthesized" } else { "passthrough" }
        );
        self.handles.insert(fh, Arc::new(handle));
        Ok(fh)
    }

    pub fn get(&self, fh: u64) -> Result<Arc<FileHandle>, HandleError> {
        self.handles
            .get(&fh)
            .map(|entry| entry.value().clone())
            .ok_or(HandleError::BadHandle(fh))
    }

    pub async fn read(&self, fh: u64, offset: u64, size: u32) -> Result<Vec<u8>, HandleError> {
        log_trace!(self.logger, "read fh {} offset {} size {}", fh, offset, size);
        let handle = self.get(fh)?;
        Ok(handle.read_at(offset, size).await?)
    }

    /// Close a handle. The file closes once in-flight reads finish with it.
    pub fn release(&self, fh: u64) -> Result<(), HandleError> {
        self.handles
            .remove(&fh)
            .map(|_| ())
            .ok_or(HandleError::BadHandle(fh))
    }

    /// Flush a writable handle to disk; read-only handles are untouched.
    pub async fn fsync(&self, fh: u64, datasync: bool) -> Result<(), HandleError> {
        let handle = self.get(fh)?;
        Ok(handle.sync(datasync).await?)
    }

    pub fn open_count(&self) -> usize {
        self.handles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MountConfig;
    use crate::demux::{MockDemuxer, TrackInfo};
    use crate::log::NoOpLogger;
    use tempfile::TempDir;

    struct Fixture {
        root: TempDir,
        _cache: TempDir,
        demuxer: Arc<MockDemuxer>,
        cache: Arc<CacheStore>,
        mux: FileHandleMultiplexer,
    }

    fn fixture() -> Fixture {
        let root = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let config = Arc::new(
            MountConfig::builder(root.path())
                .cache_dir(cache_dir.path())
                .build()
                .unwrap(),
        );
        let demuxer = Arc::new(MockDemuxer::new());
        let cache = Arc::new(CacheStore::new(
            config.clone(),
            demuxer.clone(),
            Arc::new(NoOpLogger),
        ));
        let resolver = Arc::new(PathResolver::new(config, Arc::new(NoOpLogger)));
        let mux = FileHandleMultiplexer::new(resolver, cache.clone(), Arc::new(NoOpLogger));
        Fixture {
            root,
            _cache: cache_dir,
            demuxer,
            cache,
            mux,
        }
    }

    #[test]
    fn test_open_mode_from_flags() {
        assert_eq!(
            OpenMode::from_flags(libc::O_RDONLY),
            OpenMode {
                read: true,
                write: false,
                append: false
            }
        );
        assert!(!OpenMode::from_flags(libc::O_WRONLY).read);
        assert!(OpenMode::from_flags(libc::O_WRONLY).wants_write());
        let rdwr = OpenMode::from_flags(libc::O_RDWR);
        assert!(rdwr.read && rdwr.write);
        assert!(OpenMode::from_flags(libc::O_RDONLY | libc::O_APPEND).wants_write());
    }

    #[tokio::test]
    async fn test_passthrough_read() {
        let fx = fixture();
        std::fs::write(fx.root.path().join("notes.txt"), b"hello world").unwrap();

        let fh = fx.mux.open(Path::new("notes.txt"), libc::O_RDONLY).await.unwrap();
        assert!(!fx.mux.get(fh).unwrap().is_synthesized());
        assert_eq!(fx.mux.read(fh, 6, 100).await.unwrap(), b"world");
        assert_eq!(fx.mux.read(fh, 0, 5).await.unwrap(), b"hello");
        assert!(fx.mux.read(fh, 50, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_synthesized_open_extracts_once() {
        let fx = fixture();
        let video = fx.root.path().join("movie.mkv");
        std::fs::write(&video, b"matroska").unwrap();
        fx.demuxer.add_track(
            &video,
            TrackInfo::subtitle(2, "S_TEXT/UTF8", "eng"),
            "1\n00:00:01,000 --> 00:00:02,000\nHi\n",
        );

        let first = fx.mux.open(Path::new("/movie.srt"), libc::O_RDONLY).await.unwrap();
        let second = fx.mux.open(Path::new("/movie.srt"), libc::O_RDONLY).await.unwrap();
        assert_ne!(first, second);
        assert!(fx.mux.get(first).unwrap().is_synthesized());

        let data = fx.mux.read(second, 0, 4096).await.unwrap();
        assert_eq!(data, b"1\n00:00:01,000 --> 00:00:02,000\nHi\n");
        assert_eq!(fx.demuxer.extract_calls(), 1);
        assert!(fx.cache.is_valid(&fx.cache.key(&video), "srt").await);
    }

    #[tokio::test]
    async fn test_virtual_open_for_write_rejected() {
        let fx = fixture();
        let video = fx.root.path().join("movie.mkv");
        std::fs::write(&video, b"matroska").unwrap();
        fx.demuxer
            .add_track(&video, TrackInfo::subtitle(0, "S_TEXT/UTF8", "eng"), "x");

        let err = fx
            .mux
            .open(Path::new("movie.srt"), libc::O_WRONLY)
            .await
            .unwrap_err();
        assert!(matches!(err, HandleError::ReadOnlyViolation(_)));
        assert_eq!(fx.demuxer.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_track_is_not_found() {
        let fx = fixture();
        let video = fx.root.path().join("movie.mkv");
        std::fs::write(&video, b"matroska").unwrap();
        fx.demuxer
            .add_track(&video, TrackInfo::subtitle(0, "S_TEXT/UTF8", "fre"), "x");

        let err = fx
            .mux
            .open(Path::new("movie.srt"), libc::O_RDONLY)
            .await
            .unwrap_err();
        assert!(matches!(err, HandleError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unresolvable_is_not_found() {
        let fx = fixture();
        let err = fx
            .mux
            .open(Path::new("nothing.srt"), libc::O_RDONLY)
            .await
            .unwrap_err();
        assert!(matches!(err, HandleError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_release_and_bad_handle() {
        let fx = fixture();
        std::fs::write(fx.root.path().join("a.txt"), b"a").unwrap();
        let fh = fx.mux.open(Path::new("a.txt"), libc::O_RDONLY).await.unwrap();
        assert_eq!(fx.mux.open_count(), 1);

        fx.mux.release(fh).unwrap();
        assert_eq!(fx.mux.open_count(), 0);
        assert!(matches!(fx.mux.release(fh), Err(HandleError::BadHandle(n)) if n == fh));
        assert!(matches!(fx.mux.read(fh, 0, 1).await, Err(HandleError::BadHandle(_))));
    }

    #[tokio::test]
    async fn test_fsync() {
        let fx = fixture();
        std::fs::write(fx.root.path().join("a.txt"), b"a").unwrap();

        let ro = fx.mux.open(Path::new("a.txt"), libc::O_RDONLY).await.unwrap();
        fx.mux.fsync(ro, false).await.unwrap();

        let rw = fx.mux.open(Path::new("a.txt"), libc::O_RDWR).await.unwrap();
        assert!(fx.mux.get(rw).unwrap().file().is_writable());
        fx.mux.fsync(rw, true).await.unwrap();
        fx.mux.fsync(rw, false).await.unwrap();

        assert!(matches!(fx.mux.fsync(999, false).await, Err(HandleError::BadHandle(999))));
        assert_eq!(std::fs::read(fx.root.path().join("a.txt")).unwrap(), b"a");
    }
}
