//! In-memory demuxer for testing.

use super::{BoxFuture, DemuxError, Demuxer, TrackInfo};
use dashmap::{DashMap, DashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory [`Demuxer`] for tests.
///
/// Tracks are registered per video path together with the bytes
/// `extract_track` returns for them. Call counters let tests assert how many
/// extractions a scenario triggered, and an optional delay widens race
/// windows in concurrency tests.
///
/// ```
/// use subtitlefs::demux::{Demuxer, MockDemuxer, TrackInfo};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let demuxer = MockDemuxer::new();
/// demuxer.add_track("/v/movie.mkv", TrackInfo::subtitle(2, "S_TEXT/ASS", "eng"), b"[Script Info]");
///
/// let tracks = demuxer.list_tracks(Path::new("/v/movie.mkv")).await.unwrap();
/// assert_eq!(tracks.len(), 1);
/// assert_eq!(demuxer.list_calls(), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockDemuxer {
    videos: DashMap<PathBuf, Vec<(TrackInfo, Vec<u8>)>>,
    failing: DashSet<PathBuf>,
    failing_tracks: DashMap<(PathBuf, u32), usize>,
    delay: Option<Duration>,
    list_calls: AtomicUsize,
    extract_calls: AtomicUsize,
}

impl MockDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Register a track (and its payload) for `video`.
    pub fn add_track(&self, video: impl Into<PathBuf>, track: TrackInfo, data: impl Into<Vec<u8>>) {
        self.videos
            .entry(video.into())
            .or_default()
            .push((track, data.into()));
    }

    /// Replace the payload of an already registered track.
    pub fn set_track_data(&self, video: &Path, index: u32, data: impl Into<Vec<u8>>) {
        if let Some(mut tracks) = self.videos.get_mut(video) {
            if let Some(entry) = tracks.iter_mut().find(|(track, _)| track.index == index) {
                entry.1 = data.into();
            }
        }
    }

    /// Make every call for `video` fail until cleared.
    pub fn set_failing(&self, video: impl Into<PathBuf>, failing: bool) {
        let video = video.into();
        if failing {
            self.failing.insert(video);
        } else {
            self.failing.remove(&video);
        }
    }

    /// Make the next `times` extractions of one track fail.
    pub fn fail_track(&self, video: impl Into<PathBuf>, index: u32, times: usize) {
        self.failing_tracks.insert((video.into(), index), times);
    }

    /// Number of `list_tracks` calls so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `extract_track` calls so far.
    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.list_calls.store(0, Ordering::SeqCst);
        self.extract_calls.store(0, Ordering::SeqCst);
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_failing(&self, video: &Path) -> Result<(), DemuxError> {
        if self.failing.contains(video) {
            return Err(DemuxError::Failed {
                tool: "mock",
                status: "exit status: 2".to_string(),
                stderr: format!("injected failure for {}", video.display()),
            });
        }
        Ok(())
    }

    fn check_failing_track(&self, video: &Path, index: u32) -> Result<(), DemuxError> {
        let key = (video.to_path_buf(), index);
        let Some(mut remaining) = self.failing_tracks.get_mut(&key) else {
            return Ok(());
        };
        if *remaining == 0 {
            return Ok(());
        }
        *remaining -= 1;
        Err(DemuxError::Failed {
            tool: "mock",
            status: "exit status: 2".to_string(),
            stderr: format!("injected failure for track {} of {}", index, video.display()),
        })
    }
}

impl Demuxer for MockDemuxer {
    fn list_tracks<'a>(
        &'a self,
        video: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<TrackInfo>, DemuxError>> {
        Box::pin(async move {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await;
            self.check_failing(video)?;

            Ok(self
                .videos
                .get(video)
                .map(|tracks| tracks.iter().map(|(track, _)| track.clone()).collect())
                .unwrap_or_default())
        })
    }

    fn extract_track<'a>(
        &'a self,
        video: &'a Path,
        index: u32,
    ) -> BoxFuture<'a, Result<Vec<u8>, DemuxError>> {
        Box::pin(async move {
            self.extract_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await;
            self.check_failing(video)?;
            self.check_failing_track(video, index)?;

            self.videos
                .get(video)
                .and_then(|tracks| {
                    tracks
                        .iter()
                        .find(|(track, _)| track.index == index)
                        .map(|(_, data)| data.clone())
                })
                .ok_or_else(|| DemuxError::NoSuchTrack {
                    video: video.to_path_buf(),
                    index,
                })
        })
    }
}
