//! Background cache warming.
//!
//! One long-lived task walks the source tree and makes sure every video's
//! subtitles are cached. Foreground operations that would rather not block
//! on an extraction hand the video to the coordinator through an
//! [`ImmediateQueue`]; queued videos are serviced before the next scanned
//! video and while the coordinator is idle between passes.
//!
//! ```text
//! readdir miss ──► ImmediateQueue ──┐
//!                                   ├──► ExtractionCoordinator ──► CacheStore::put
//! tree walk (every scan_interval) ──┘
//! ```
//!
//! A failure on one video is logged and counted; the pass moves on.

use crate::cache::CacheStore;
use crate::config::MountConfig;
use crate::log::Logger;
use crate::subtitle::is_video_path;
use crate::{log_debug, log_error, log_info, log_warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// How long [`CoordinatorHandle::stop`] waits for an in-flight extraction.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Sending half of the immediate-request queue.
#[derive(Debug, Clone)]
pub struct ImmediateQueue {
    sender: mpsc::UnboundedSender<PathBuf>,
}

impl ImmediateQueue {
    /// Ask the coordinator to cache `video` at its next drain point.
    ///
    /// Returns `false` if the coordinator is gone.
    pub fn request(&self, video: PathBuf) -> bool {
        self.sender.send(video).is_ok()
    }
}

/// Snapshot of coordinator activity.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub passes_completed: u64,
    pub videos_scanned: u64,
    pub extractions: u64,
    pub failures: u64,
    pub immediate_serviced: u64,
}

/// Counters shared between the coordinator task and observers.
#[derive(Debug, Default)]
pub struct CoordinatorCounters {
    passes_completed: AtomicU64,
    videos_scanned: AtomicU64,
    extractions: AtomicU64,
    failures: AtomicU64,
    immediate_serviced: AtomicU64,
}

impl CoordinatorCounters {
    pub fn snapshot(&self) -> CoordinatorStats {
        CoordinatorStats {
            passes_completed: self.passes_completed.load(Ordering::Relaxed),
            videos_scanned: self.videos_scanned.load(Ordering::Relaxed),
            extractions: self.extractions.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            immediate_serviced: self.immediate_serviced.load(Ordering::Relaxed),
        }
    }
}

/// Result of a single scan pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub videos: usize,
    pub extracted: usize,
    pub failed: usize,
}

enum Outcome {
    Fresh,
    Extracted,
    NothingToCache,
    Failed,
}

/// The background scan-and-extract loop.
pub struct ExtractionCoordinator {
    config: Arc<MountConfig>,
    cache: Arc<CacheStore>,
    logger: Arc<dyn Logger>,
    sender: mpsc::UnboundedSender<PathBuf>,
    receiver: mpsc::UnboundedReceiver<PathBuf>,
    counters: Arc<CoordinatorCounters>,
}

impl ExtractionCoordinator {
    pub fn new(config: Arc<MountConfig>, cache: Arc<CacheStore>, logger: Arc<dyn Logger>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            config,
            cache,
            logger,
            sender,
            receiver,
            counters: Arc::new(CoordinatorCounters::default()),
        }
    }

    /// A producer handle for foreground requests.
    pub fn queue(&self) -> ImmediateQueue {
        ImmediateQueue {
            sender: self.sender.clone(),
        }
    }

    pub fn counters(&self) -> Arc<CoordinatorCounters> {
        self.counters.clone()
    }

    /// Run the loop on the current runtime until the handle stops it.
    pub fn spawn(self) -> CoordinatorHandle {
        let cancel = CancellationToken::new();
        let queue = self.queue();
        let counters = self.counters();
        let task = tokio::spawn(self.run(cancel.clone()));
        CoordinatorHandle {
            queue,
            counters,
            cancel,
            task,
        }
    }

    /// One full pass, for callers that do not run the loop.
    pub async fn run_single_pass(&mut self) -> PassSummary {
        self.run_pass(&CancellationToken::new()).await
    }

    /// Scan, wait `scan_interval` while servicing requests, repeat.
    pub async fn run(mut self, cancel: CancellationToken) {
        log_info!(
            self.logger,
            "Extraction coordinator started (root: {}, interval: {:?})",
            self.config.root().display(),
            self.config.scan_interval()
        );

        while !cancel.is_cancelled() {
            let summary = self.run_pass(&cancel).await;
            log_info!(
                self.logger,
                "Scan pass complete: {} videos, {} extracted, {} failed",
                summary.videos,
                summary.extracted,
                summary.failed
            );

            if self.config.prune_orphans() && !cancel.is_cancelled() {
                if let Err(e) = self.cache.prune_orphans().await {
                    log_warn!(self.logger, "Orphan pruning failed: {}", e);
                }
            }

            let deadline = Instant::now() + self.config.scan_interval();
            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break,

                    Some(video) = self.receiver.recv() => {
                        self.service_immediate(video).await;
                    }

                    _ = tokio::time::sleep_until(deadline) => break,
                }
            }
        }

        log_info!(self.logger, "Extraction coordinator stopped");
    }

    /// Walk the whole tree once, caching every stale video.
    ///
    /// Pending immediate requests are drained before each scanned video.
    /// After a complete pass, remembered track lists of videos that were not
    /// found are dropped.
    async fn run_pass(&mut self, cancel: &CancellationToken) -> PassSummary {
        let videos = self.collect_videos().await;
        let mut summary = PassSummary::default();

        for video in &videos {
            if cancel.is_cancelled() {
                break;
            }
            self.drain_immediate().await;

            summary.videos += 1;
            self.counters.videos_scanned.fetch_add(1, Ordering::Relaxed);
            match self.process(video).await {
                Outcome::Extracted => summary.extracted += 1,
                Outcome::Failed => summary.failed += 1,
                Outcome::Fresh | Outcome::NothingToCache => {}
            }
        }
        self.drain_immediate().await;

        if !cancel.is_cancelled() {
            let seen: HashSet<&Path> = videos.iter().map(PathBuf::as_path).collect();
            self.cache.retain_offers(|video| seen.contains(video));
        }

        self.counters.passes_completed.fetch_add(1, Ordering::Relaxed);
        summary
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.counters.snapshot()
    }

    async fn drain_immediate(&mut self) {
        while let Ok(video) = self.receiver.try_recv() {
            self.service_immediate(video).await;
        }
    }

    async fn service_immediate(&mut self, video: PathBuf) {
        log_debug!(self.logger, "Servicing immediate request for {}", video.display());
        self.counters.immediate_serviced.fetch_add(1, Ordering::Relaxed);
        self.process(&video).await;
    }

    async fn process(&self, video: &Path) -> Outcome {
        let key = self.cache.key(video);
        if self.cache.is_complete(&key).await {
            return Outcome::Fresh;
        }

        match self.cache.fill(&key, None).await {
            Ok(filled) if filled.extracted > 0 => {
                self.counters.extractions.fetch_add(1, Ordering::Relaxed);
                Outcome::Extracted
            }
            Ok(filled) if filled.paths.is_empty() => Outcome::NothingToCache,
            Ok(_) => Outcome::Fresh,
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                log_warn!(
                    self.logger,
                    "Skipping {} after extraction error: {}",
                    video.display(),
                    e
                );
                Outcome::Failed
            }
        }
    }

    async fn collect_videos(&self) -> Vec<PathBuf> {
        let root = self.config.root().to_path_buf();
        let logger = self.logger.clone();
        let walk = tokio::task::spawn_blocking(move || {
            let mut videos = Vec::new();
            for entry in WalkDir::new(&root).follow_links(true) {
                match entry {
                    Ok(entry) if entry.file_type().is_file() && is_video_path(entry.path()) => {
                        videos.push(entry.into_path());
                    }
                    Ok(_) => {}
                    Err(e) => log_debug!(logger, "Scan skipped an entry: {}", e),
                }
            }
            videos.sort();
            videos
        });

        match walk.await {
            Ok(videos) => videos,
            Err(e) => {
                log_error!(self.logger, "Tree walk failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// Control handle for a spawned coordinator.
pub struct CoordinatorHandle {
    queue: ImmediateQueue,
    counters: Arc<CoordinatorCounters>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl CoordinatorHandle {
    pub fn request_immediate(&self, video: PathBuf) -> bool {
        self.queue.request(video)
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.counters.snapshot()
    }

    /// Signal the loop to stop at its next await point.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Wait for the loop to exit.
    pub async fn join(self) {
        let _ = self.task.await;
    }

    /// Stop the loop and wait for it, aborting an extraction that outlives
    /// the grace period. Aborting drops the child process, which kills it.
    pub async fn stop(mut self) {
        self.shutdown();
        if tokio::time::timeout(STOP_GRACE, &mut self.task).await.is_err() {
            self.task.abort();
            let _ = (&mut self.task).await;
        }
    }
}
