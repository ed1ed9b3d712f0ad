//! Integration tests for the overlay as seen through the operation contract.
//!
//! Every test builds a real source tree and cache directory in temp dirs and
//! substitutes [`MockDemuxer`] for MKVToolNix, so extraction calls can be
//! counted.
//!
//! Run with: `cargo test --test overlay_integration`

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use filetime::FileTime;
use futures::future::join_all;
use futures::StreamExt;
use tempfile::TempDir;
use walkdir::WalkDir;

use subtitlefs::config::MountConfig;
use subtitlefs::demux::{Demuxer, MockDemuxer, TrackInfo};
use subtitlefs::facade::{EntryOrigin, FsError, SubtitleFs};
use subtitlefs::log::NoOpLogger;

const SRT: &str = "1\n00:00:01,000 --> 00:00:03,500\nHello there.\n\n2\n00:00:04,000 --> 00:00:06,000\nGeneral Kenobi!\n";
const ASS: &str = "[Script Info]\nScriptType: v4.00+\n\n[Events]\nDialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,Hi\n";

// ============================================================================
// Test Helpers
// ============================================================================

struct Overlay {
    root: TempDir,
    cache: TempDir,
    demuxer: Arc<MockDemuxer>,
    fs: Arc<SubtitleFs>,
}

fn overlay_with(demuxer: MockDemuxer, cache_only: bool) -> Overlay {
    let root = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let config = Arc::new(
        MountConfig::builder(root.path())
            .cache_dir(cache.path())
            .cache_only(cache_only)
            .scan_interval(Duration::from_secs(3600))
            .build()
            .unwrap(),
    );
    let demuxer = Arc::new(demuxer);
    let fs = Arc::new(SubtitleFs::with_logger(
        config,
        demuxer.clone(),
        Arc::new(NoOpLogger),
    ));
    Overlay {
        root,
        cache,
        demuxer,
        fs,
    }
}

fn overlay() -> Overlay {
    overlay_with(MockDemuxer::new(), true)
}

impl Overlay {
    /// Create a video file and register its tracks with the mock.
    fn add_video(&self, relative: &str, tracks: &[(u32, &str, &str, &str)]) -> PathBuf {
        let path = self.fs.config().root().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, b"\x1a\x45\xdf\xa3 matroska").unwrap();
        for (index, codec, language, data) in tracks {
            self.demuxer.add_track(
                &path,
                TrackInfo::subtitle(*index, *codec, *language),
                *data,
            );
        }
        path
    }

    async fn read_all(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let fh = self.fs.open(Path::new(path), libc::O_RDONLY).await?;
        let mut data = Vec::new();
        loop {
            let chunk = self.fs.read(fh, data.len() as u64, 7).await?;
            if chunk.is_empty() {
                break;
            }
            data.extend_from_slice(&chunk);
        }
        self.fs.release(fh)?;
        Ok(data)
    }

    fn cache_entry(&self, video: &Path, ext: &str) -> PathBuf {
        let cache = self.fs.cache();
        cache.entry_path(&cache.key(video), ext).unwrap()
    }

    async fn listing(&self, dir: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .fs
            .readdir(Path::new(dir), 0)
            .await
            .unwrap()
            .map(|entry| entry.unwrap().name.to_string_lossy().into_owned())
            .collect()
            .await;
        names.sort();
        names
    }
}

/// Every file under `dir` with its contents.
fn snapshot(dir: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let data = std::fs::read(entry.path()).unwrap();
            (entry.into_path(), data)
        })
        .collect();
    files.sort();
    files
}

fn mtime(path: &Path) -> FileTime {
    FileTime::from_last_modification_time(&std::fs::metadata(path).unwrap())
}

// ============================================================================
// Content
// ============================================================================

#[tokio::test]
async fn test_virtual_subtitle_matches_direct_extraction() {
    let overlay = overlay();
    let video = overlay.add_video(
        "Films/Heist (2019).mkv",
        &[(3, "S_TEXT/UTF8", "eng", SRT), (4, "S_TEXT/ASS", "eng", ASS)],
    );

    let direct_srt = overlay.demuxer.extract_track(&video, 3).await.unwrap();
    let direct_ass = overlay.demuxer.extract_track(&video, 4).await.unwrap();

    assert_eq!(
        overlay.read_all("Films/Heist (2019).srt").await.unwrap(),
        direct_srt
    );
    assert_eq!(
        overlay.read_all("/Films/Heist (2019).ass").await.unwrap(),
        direct_ass
    );
}

#[tokio::test]
async fn test_first_track_in_language_wins() {
    let overlay = overlay();
    overlay.add_video(
        "movie.mkv",
        &[
            (1, "S_TEXT/UTF8", "ger", "german"),
            (2, "S_TEXT/UTF8", "eng", "english forced"),
            (3, "S_TEXT/UTF8", "eng", "english full"),
        ],
    );

    assert_eq!(
        overlay.read_all("movie.srt").await.unwrap(),
        b"english forced"
    );
}

#[tokio::test]
async fn test_real_files_pass_through() {
    let overlay = overlay();
    overlay.add_video("movie.mkv", &[(0, "S_TEXT/UTF8", "eng", SRT)]);
    std::fs::write(overlay.root.path().join("movie.srt"), b"hand made").unwrap();

    assert_eq!(overlay.read_all("movie.srt").await.unwrap(), b"hand made");
    assert_eq!(overlay.demuxer.list_calls(), 0);

    let stat = overlay.fs.getattr(Path::new("movie.srt")).await.unwrap();
    assert_eq!(stat.origin, EntryOrigin::Source);
}

// ============================================================================
// Caching and invalidation
// ============================================================================

#[tokio::test]
async fn test_cache_hits_do_not_extract_again() {
    let overlay = overlay();
    let video = overlay.add_video("movie.mkv", &[(0, "S_TEXT/UTF8", "eng", SRT)]);

    let first_stat = overlay.fs.getattr(Path::new("movie.srt")).await.unwrap();
    let first = overlay.read_all("movie.srt").await.unwrap();
    for _ in 0..5 {
        let stat = overlay.fs.getattr(Path::new("movie.srt")).await.unwrap();
        assert_eq!(stat.size, first_stat.size);
        assert_eq!(overlay.read_all("movie.srt").await.unwrap(), first);
    }

    assert_eq!(first_stat.size, SRT.len() as u64);
    assert_eq!(overlay.demuxer.extract_calls(), 1);
    assert_eq!(mtime(&overlay.cache_entry(&video, "srt")), mtime(&video));
}

#[tokio::test]
async fn test_changed_video_is_extracted_again() {
    let overlay = overlay();
    let video = overlay.add_video("movie.mkv", &[(0, "S_TEXT/UTF8", "eng", "old cut")]);
    assert_eq!(overlay.read_all("movie.srt").await.unwrap(), b"old cut");

    let original = mtime(&video);
    let remuxed = FileTime::from_unix_time(original.unix_seconds() + 3600, 0);
    filetime::set_file_mtime(&video, remuxed).unwrap();
    assert_ne!(mtime(&video), original);
    overlay.demuxer.set_track_data(&video, 0, "director's cut");

    assert_eq!(
        overlay.read_all("movie.srt").await.unwrap(),
        b"director's cut"
    );
    assert_eq!(overlay.demuxer.extract_calls(), 2);
    assert_eq!(mtime(&overlay.cache_entry(&video, "srt")), mtime(&video));
}

#[tokio::test]
async fn test_failed_extraction_is_retried() {
    let overlay = overlay();
    let video = overlay.add_video("movie.mkv", &[(0, "S_TEXT/UTF8", "eng", SRT)]);

    overlay.demuxer.set_failing(&video, true);
    let err = overlay.read_all("movie.srt").await.unwrap_err();
    assert_eq!(err.errno(), libc::ENOENT);
    assert!(!overlay.cache_entry(&video, "srt").exists());

    overlay.demuxer.set_failing(&video, false);
    assert_eq!(overlay.read_all("movie.srt").await.unwrap(), SRT.as_bytes());
}

// ============================================================================
// Directory listings
// ============================================================================

#[tokio::test]
async fn test_readdir_adds_one_entry_per_served_format() {
    let overlay = overlay();
    overlay.add_video("movie.mkv", &[(2, "S_TEXT/ASS", "eng", ASS)]);

    assert_eq!(overlay.listing("/").await, vec!["movie.ass", "movie.mkv"]);
}

#[tokio::test]
async fn test_readdir_in_subdirectories() {
    let overlay = overlay();
    overlay.add_video("Show/S01/e01.mkv", &[(0, "S_TEXT/UTF8", "eng", SRT)]);
    overlay.add_video("Show/S01/e02.mkv", &[(0, "S_TEXT/UTF8", "jpn", SRT)]);
    std::fs::write(overlay.root.path().join("Show/S01/cover.jpg"), b"jpeg").unwrap();

    assert_eq!(overlay.listing("/").await, vec!["Show"]);
    assert_eq!(
        overlay.listing("Show/S01").await,
        vec!["cover.jpg", "e01.mkv", "e01.srt", "e02.mkv"]
    );
}

#[tokio::test]
async fn test_readdir_hands_stale_videos_to_coordinator() {
    let overlay = overlay_with(MockDemuxer::new(), false);
    overlay.fs.on_mount_start().await.unwrap();

    // Added after the first background pass had a chance to run.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let video = overlay.add_video("late.mkv", &[(0, "S_TEXT/UTF8", "eng", SRT)]);
    assert!(overlay.listing("/").await.contains(&"late.srt".to_string()));

    let entry = overlay.cache_entry(&video, "srt");
    for _ in 0..200 {
        if entry.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(entry.exists(), "coordinator should cache the listed video");

    overlay.fs.on_mount_stop().await;
}

// ============================================================================
// Resolution errors
// ============================================================================

#[tokio::test]
async fn test_ambiguous_basename_is_rejected() {
    let overlay = overlay();
    overlay.add_video("movie.mkv", &[(0, "S_TEXT/UTF8", "eng", SRT)]);
    overlay.add_video("movie.mkv.bak", &[(0, "S_TEXT/UTF8", "eng", SRT)]);

    let err = overlay.fs.getattr(Path::new("movie.srt")).await.unwrap_err();
    match &err {
        FsError::Ambiguous { candidates, .. } => assert_eq!(candidates.len(), 2),
        other => panic!("expected an ambiguity error, got {other:?}"),
    }
    assert_eq!(err.errno(), libc::EINVAL);

    let err = overlay
        .fs
        .open(Path::new("movie.srt"), libc::O_RDONLY)
        .await
        .unwrap_err();
    assert_eq!(err.errno(), libc::EINVAL);
    assert_eq!(overlay.demuxer.list_calls(), 0);
}

#[tokio::test]
async fn test_unrelated_names_do_not_resolve() {
    let overlay = overlay();
    overlay.add_video("movie2.mkv", &[(0, "S_TEXT/UTF8", "eng", SRT)]);

    for path in ["film.srt", "movie2.txt", "movie20.srt", "../movie2.srt"] {
        let err = overlay.fs.getattr(Path::new(path)).await.unwrap_err();
        assert_eq!(err.errno(), libc::ENOENT, "{path}");
    }
}

#[tokio::test]
async fn test_subtitle_base_may_be_a_prefix_of_the_video_name() {
    let overlay = overlay();
    overlay.add_video("movie-extended.mkv", &[(0, "S_TEXT/UTF8", "eng", SRT)]);

    assert_eq!(overlay.read_all("movie.srt").await.unwrap(), SRT.as_bytes());

    overlay.add_video("movie.mkv", &[(0, "S_TEXT/UTF8", "eng", SRT)]);
    let err = overlay.fs.getattr(Path::new("movie.srt")).await.unwrap_err();
    assert_eq!(err.errno(), libc::EINVAL);
}

// ============================================================================
// Read-only surface
// ============================================================================

#[tokio::test]
async fn test_write_and_mknod_leave_trees_untouched() {
    let overlay = overlay();
    overlay.add_video("movie.mkv", &[(0, "S_TEXT/UTF8", "eng", SRT)]);
    std::fs::write(overlay.root.path().join("notes.txt"), b"keep").unwrap();
    overlay.read_all("movie.srt").await.unwrap();

    let source_before = snapshot(overlay.root.path());
    let cache_before = snapshot(overlay.cache.path());

    for path in ["movie.srt", "movie.mkv", "notes.txt", "new.srt"] {
        let err = overlay
            .fs
            .write(Path::new(path), 0, b"overwrite")
            .unwrap_err();
        assert_eq!(err.errno(), libc::EROFS);
        let err = overlay.fs.mknod(Path::new(path), 0o100644).unwrap_err();
        assert_eq!(err.errno(), libc::EROFS);
    }
    let err = overlay
        .fs
        .open(Path::new("movie.srt"), libc::O_RDWR)
        .await
        .unwrap_err();
    assert_eq!(err.errno(), libc::EROFS);

    assert_eq!(snapshot(overlay.root.path()), source_before);
    assert_eq!(snapshot(overlay.cache.path()), cache_before);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_opens_extract_once() {
    let overlay = overlay_with(
        MockDemuxer::new().with_delay(Duration::from_millis(100)),
        true,
    );
    let video = overlay.add_video("movie.mkv", &[(0, "S_TEXT/UTF8", "eng", SRT)]);

    let tasks = (0..2).map(|_| {
        let fs = overlay.fs.clone();
        tokio::spawn(async move {
            let fh = fs.open(Path::new("movie.srt"), libc::O_RDONLY).await.unwrap();
            let data = fs.read(fh, 0, 64 * 1024).await.unwrap();
            fs.release(fh).unwrap();
            data
        })
    });
    let results: Vec<Vec<u8>> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(overlay.demuxer.extract_calls(), 1);
    assert_eq!(overlay.demuxer.list_calls(), 1);
    assert_eq!(overlay.fs.cache().stats().files_written, 1);
    assert_eq!(results[0], results[1]);
    assert_eq!(
        std::fs::read(overlay.cache_entry(&video, "srt")).unwrap(),
        SRT.as_bytes()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unrelated_videos_extract_in_parallel() {
    let overlay = overlay_with(
        MockDemuxer::new().with_delay(Duration::from_millis(200)),
        true,
    );
    for name in ["a.mkv", "b.mkv", "c.mkv", "d.mkv"] {
        overlay.add_video(name, &[(0, "S_TEXT/UTF8", "eng", SRT)]);
    }

    let started = std::time::Instant::now();
    let results = join_all(["a.srt", "b.srt", "c.srt", "d.srt"].map(|name| {
        let fs = overlay.fs.clone();
        async move { fs.getattr(Path::new(name)).await.map(|stat| stat.size) }
    }))
    .await;

    assert!(results.iter().all(|r| matches!(r, Ok(size) if *size == SRT.len() as u64)));
    assert_eq!(overlay.demuxer.extract_calls(), 4);
    // Each getattr waits on list + extract (2 × 200ms); serialized would be 3.2s.
    assert!(started.elapsed() < Duration::from_millis(1600));
}
