//! Cache store: validity checks, extraction and maintenance.

use super::gate::ExtractionGate;
use super::path::{entry_path, language_dir, mirrored_source_dir};
use super::types::{CacheError, CacheKey, CacheStats, PruneReport};
use crate::config::MountConfig;
use crate::demux::{Demuxer, TrackInfo};
use crate::log::Logger;
use crate::subtitle::{has_video_segment, SubtitleFormat};
use crate::{log_debug, log_info, log_warn};
use dashmap::DashMap;
use filetime::FileTime;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs::Metadata;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

/// Subtitle tracks a video offered when it had a given mtime.
#[derive(Debug, Clone)]
struct Offer {
    mtime: FileTime,
    tracks: Vec<(SubtitleFormat, u32)>,
}

/// Result of filling the cache for one key.
#[derive(Debug, Default)]
pub(crate) struct Filled {
    /// Every entry now fresh for the key.
    pub paths: Vec<PathBuf>,
    /// How many of them this call extracted.
    pub extracted: usize,
}

/// On-disk cache of extracted subtitles.
///
/// Shared by the foreground filesystem operations and the background
/// coordinator; every method takes `&self`.
///
/// Besides the files on disk, the store remembers which tracks each video
/// offered at its current mtime. A video is complete only when every one of
/// them has a fresh entry, so a track whose extraction failed is retried
/// while its siblings stay cached.
pub struct CacheStore {
    config: Arc<MountConfig>,
    demuxer: Arc<dyn Demuxer>,
    gate: ExtractionGate,
    offers: DashMap<CacheKey, Offer>,
    logger: Arc<dyn Logger>,
    extractions: AtomicU64,
    reused: AtomicU64,
    files_written: AtomicU64,
    failures: AtomicU64,
}

impl CacheStore {
    pub fn new(
        config: Arc<MountConfig>,
        demuxer: Arc<dyn Demuxer>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            config,
            demuxer,
            gate: ExtractionGate::new(logger.clone()),
            offers: DashMap::new(),
            logger,
            extractions: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            files_written: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Key for `video` in the mount's language.
    pub fn key(&self, video: &Path) -> CacheKey {
        CacheKey::new(video, self.config.language())
    }

    /// Where the `ext` subtitle for `key` lives (valid or not).
    pub fn entry_path(&self, key: &CacheKey, ext: &str) -> Result<PathBuf, CacheError> {
        entry_path(self.config.cache_dir(), key, ext)
            .ok_or_else(|| CacheError::InvalidKey(key.video().to_path_buf()))
    }

    /// Whether a valid `ext` entry exists for `key`.
    pub async fn is_valid(&self, key: &CacheKey, ext: &str) -> bool {
        matches!(self.valid_entry(key, ext).await, Ok(Some(_)))
    }

    /// Whether every track the video is known to offer has a valid entry.
    ///
    /// A video whose tracks have not been listed at its current mtime is
    /// never complete.
    pub async fn is_complete(&self, key: &CacheKey) -> bool {
        let Ok(video_meta) = tokio::fs::metadata(key.video()).await else {
            return false;
        };
        let Some(tracks) = self.known_offer(key, &video_meta) else {
            return false;
        };
        for (format, _) in tracks {
            if !matches!(
                self.valid_entry_for(key, format.extension(), &video_meta).await,
                Ok(Some(_))
            ) {
                return false;
            }
        }
        true
    }

    /// Path and metadata of the `ext` entry for `key`, if it is valid.
    ///
    /// Valid means the file exists and its mtime equals the video's exactly.
    pub async fn valid_entry(
        &self,
        key: &CacheKey,
        ext: &str,
    ) -> Result<Option<(PathBuf, Metadata)>, CacheError> {
        let video_meta = match tokio::fs::metadata(key.video()).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        self.valid_entry_for(key, ext, &video_meta).await
    }

    async fn valid_entry_for(
        &self,
        key: &CacheKey,
        ext: &str,
        video_meta: &Metadata,
    ) -> Result<Option<(PathBuf, Metadata)>, CacheError> {
        let path = self.entry_path(key, ext)?;
        let entry_meta = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let fresh = FileTime::from_last_modification_time(&entry_meta)
            == FileTime::from_last_modification_time(video_meta);
        Ok(fresh.then_some((path, entry_meta)))
    }

    /// Bytes of the valid `ext` entry for `key`.
    pub async fn get(&self, key: &CacheKey, ext: &str) -> Result<Vec<u8>, CacheError> {
        match self.valid_entry(key, ext).await? {
            Some((path, _)) => Ok(tokio::fs::read(path).await?),
            None => Err(CacheError::NotCached {
                key: key.clone(),
                ext: ext.to_string(),
            }),
        }
    }

    /// Extract and cache the subtitles of `key`'s video.
    ///
    /// For every renderable format, the first subtitle track in the key's
    /// language is extracted and written with the video's mtime. Tracks in
    /// other languages or unsupported codecs produce nothing; a video with
    /// nothing to cache yields an empty list. Formats that already have a
    /// fresh entry are not extracted again. Returns every fresh entry.
    ///
    /// Concurrent calls for the same key run one at a time. A caller that
    /// had to wait re-checks freshness and, if another caller already
    /// refreshed the entries, returns them without running the demuxer.
    pub async fn put(&self, key: &CacheKey) -> Result<Vec<PathBuf>, CacheError> {
        Ok(self.fill(key, None).await?.paths)
    }

    /// [`put`](Self::put), reporting how much was extracted.
    ///
    /// With `wanted` set, a caller admitted after waiting returns as soon as
    /// that one format is fresh.
    pub(crate) async fn fill(
        &self,
        key: &CacheKey,
        wanted: Option<&str>,
    ) -> Result<Filled, CacheError> {
        let _guard = self.gate.acquire(key).await;

        let result = self.fill_locked(key, wanted).await;
        if let Err(e) = &result {
            self.failures.fetch_add(1, Ordering::Relaxed);
            log_warn!(self.logger, "Caching subtitles for {} failed: {}", key, e);
        }
        result
    }

    async fn fill_locked(&self, key: &CacheKey, wanted: Option<&str>) -> Result<Filled, CacheError> {
        let video_meta = match tokio::fs::metadata(key.video()).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CacheError::VideoMissing(key.video().to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(ext) = wanted {
            if let Some((path, _)) = self.valid_entry_for(key, ext, &video_meta).await? {
                self.reused.fetch_add(1, Ordering::Relaxed);
                log_debug!(self.logger, "{} entry already fresh for {}", ext, key);
                return Ok(Filled {
                    paths: vec![path],
                    extracted: 0,
                });
            }
        }

        let tracks = self.offer(key, &video_meta).await?;
        let mut filled = Filled::default();
        let mut missing = Vec::new();
        for (format, index) in tracks {
            match self
                .valid_entry_for(key, format.extension(), &video_meta)
                .await?
            {
                Some((path, _)) => filled.paths.push(path),
                None => missing.push((format, index)),
            }
        }

        if missing.is_empty() {
            if filled.paths.is_empty() {
                log_debug!(self.logger, "No {} subtitles to cache for {}", key.language(), key);
            } else {
                self.reused.fetch_add(1, Ordering::Relaxed);
                log_debug!(self.logger, "Cache already fresh for {}", key);
            }
            return Ok(filled);
        }

        self.extractions.fetch_add(1, Ordering::Relaxed);
        let mtime = FileTime::from_last_modification_time(&video_meta);
        for (format, index) in missing {
            let data = self
                .demuxer
                .extract_track(key.video(), index)
                .await
                .map_err(|source| CacheError::Extraction {
                    video: key.video().to_path_buf(),
                    source,
                })?;

            let path = self.entry_path(key, format.extension())?;
            write_entry(path.clone(), data, mtime).await?;
            self.files_written.fetch_add(1, Ordering::Relaxed);
            log_info!(self.logger, "Cached {}", path.display());
            filled.paths.push(path);
            filled.extracted += 1;
        }
        Ok(filled)
    }

    /// Tracks worth caching for `key`, listing them only when the video has
    /// changed since they were last listed.
    async fn offer(
        &self,
        key: &CacheKey,
        video_meta: &Metadata,
    ) -> Result<Vec<(SubtitleFormat, u32)>, CacheError> {
        if let Some(tracks) = self.known_offer(key, video_meta) {
            return Ok(tracks);
        }

        let tracks = self
            .demuxer
            .list_tracks(key.video())
            .await
            .map_err(|source| CacheError::Extraction {
                video: key.video().to_path_buf(),
                source,
            })?;
        let selected = select_tracks(&tracks, key.language());
        self.offers.insert(
            key.clone(),
            Offer {
                mtime: FileTime::from_last_modification_time(video_meta),
                tracks: selected.clone(),
            },
        );
        Ok(selected)
    }

    fn known_offer(&self, key: &CacheKey, video_meta: &Metadata) -> Option<Vec<(SubtitleFormat, u32)>> {
        let mtime = FileTime::from_last_modification_time(video_meta);
        let offer = self.offers.get(key)?;
        (offer.mtime == mtime).then(|| offer.tracks.clone())
    }

    /// Drop remembered track lists for videos `keep` rejects.
    pub fn retain_offers(&self, keep: impl Fn(&Path) -> bool) {
        self.offers.retain(|key, _| keep(key.video()));
    }

    /// Number of videos whose track list is remembered.
    pub fn known_videos(&self) -> usize {
        self.offers.len()
    }

    /// Return a valid `ext` entry for `key`, extracting first if needed.
    ///
    /// Fails with [`CacheError::NotCached`] when the video has no renderable
    /// `ext` track in the configured language.
    pub async fn ensure(&self, key: &CacheKey, ext: &str) -> Result<(PathBuf, Metadata), CacheError> {
        if let Some(entry) = self.valid_entry(key, ext).await? {
            return Ok(entry);
        }

        // A sibling track failing does not spoil the one asked for.
        let filled = self.fill(key, Some(ext)).await;
        match (self.valid_entry(key, ext).await?, filled) {
            (Some(entry), _) => Ok(entry),
            (None, Err(e)) => Err(e),
            (None, Ok(_)) => Err(CacheError::NotCached {
                key: key.clone(),
                ext: ext.to_string(),
            }),
        }
    }

    /// Subtitle formats `video` can provide in the configured language.
    ///
    /// The demuxer is asked (without extracting anything) only when the
    /// video's tracks have not been listed at its current mtime.
    pub async fn available_formats(&self, video: &Path) -> Result<Vec<SubtitleFormat>, CacheError> {
        let key = self.key(video);
        let video_meta = match tokio::fs::metadata(video).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CacheError::VideoMissing(video.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(self
            .offer(&key, &video_meta)
            .await?
            .into_iter()
            .map(|(format, _)| format)
            .collect())
    }

    /// Remove cache entries whose source video no longer exists.
    ///
    /// An entry `<dir>/<stem>.<ext>` is kept while the mirrored source
    /// directory still holds a video whose file stem is `<stem>`. Emptied
    /// directories are removed as well.
    pub async fn prune_orphans(&self) -> Result<PruneReport, CacheError> {
        let root = language_dir(self.config.cache_dir(), self.config.language());
        let report = tokio::task::spawn_blocking(move || prune_tree(&root))
            .await
            .map_err(|e| CacheError::Io(io::Error::other(e.to_string())))??;

        if report.files_removed > 0 {
            log_info!(
                self.logger,
                "Pruned {} orphaned subtitles ({} directories)",
                report.files_removed,
                report.dirs_removed
            );
        }
        Ok(report)
    }

    /// Remove every entry for the configured language.
    pub async fn clear(&self) -> Result<(), CacheError> {
        let root = language_dir(self.config.cache_dir(), self.config.language());
        match tokio::fs::remove_dir_all(&root).await {
            Ok(()) => {
                log_info!(self.logger, "Cleared {}", root.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    pub fn gate(&self) -> &ExtractionGate {
        &self.gate
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            extractions: self.extractions.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            files_written: self.files_written.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// First subtitle track per renderable format in `language`, in track order.
fn select_tracks(tracks: &[TrackInfo], language: &str) -> Vec<(SubtitleFormat, u32)> {
    let mut seen = HashSet::new();
    tracks
        .iter()
        .filter(|track| track.is_subtitle() && track.is_language(language))
        .filter_map(|track| {
            SubtitleFormat::from_codec_id(&track.codec_id).map(|format| (format, track.index))
        })
        .filter(|(format, _)| format.is_renderable() && seen.insert(*format))
        .collect()
}

/// Write `data` to `path` atomically, stamping it with `mtime`.
async fn write_entry(path: PathBuf, data: Vec<u8>, mtime: FileTime) -> Result<(), CacheError> {
    tokio::task::spawn_blocking(move || -> io::Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| io::Error::other(format!("{} has no parent", path.display())))?;
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".partial-")
            .tempfile_in(dir)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_data()?;
        filetime::set_file_handle_times(tmp.as_file(), Some(mtime), Some(mtime))?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| io::Error::other(e.to_string()))??;
    Ok(())
}

fn prune_tree(root: &Path) -> Result<PruneReport, CacheError> {
    let mut report = PruneReport::default();
    if !root.is_dir() {
        return Ok(report);
    }

    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = entry.map_err(|e| CacheError::Io(io::Error::other(e.to_string())))?;
        let path = entry.path();

        if entry.file_type().is_dir() {
            let is_empty = std::fs::read_dir(path)?.next().is_none();
            if is_empty {
                std::fs::remove_dir(path)?;
                report.dirs_removed += 1;
            }
            continue;
        }

        let relative_dir = path
            .parent()
            .and_then(|dir| dir.strip_prefix(root).ok())
            .unwrap_or(Path::new(""));
        let source_dir = mirrored_source_dir(relative_dir);
        let Some(stem) = path.file_stem() else {
            continue;
        };

        if !has_source_video(&source_dir, stem) {
            std::fs::remove_file(path)?;
            report.files_removed += 1;
        }
    }
    Ok(report)
}

fn has_source_video(source_dir: &Path, stem: &OsStr) -> bool {
    let Ok(entries) = std::fs::read_dir(source_dir) else {
        return false;
    };
    entries.flatten().any(|entry| {
        let name = entry.file_name();
        Path::new(&name).file_stem() == Some(stem) && name.to_str().is_some_and(has_video_segment)
    })
}
