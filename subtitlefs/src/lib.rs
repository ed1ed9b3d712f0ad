//! subtitlefs - subtitle overlay filesystem.
//!
//! Presents a directory tree of video containers through FUSE and makes the
//! subtitle tracks embedded in those containers appear as ordinary sibling
//! files (`movie.mkv` → `movie.srt`). Subtitles are extracted on demand,
//! cached on disk, and invalidated when the source video changes.
//!
//! # Layers
//!
//! - [`resolver`] classifies a requested path as passthrough, virtual
//!   subtitle, or missing
//! - [`cache`] stores extracted subtitles with mtime-based validity
//! - [`coordinator`] pre-warms the cache in the background
//! - [`handle`] opens either the real file or the synthesized cache file
//! - [`facade`] implements the filesystem operation contract
//! - [`fuse`] adapts the facade to the kernel through `fuse3`

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod demux;
pub mod facade;
pub mod fuse;
pub mod handle;
pub mod log;
pub mod logging;
pub mod resolver;
pub mod subtitle;

/// Version of the subtitlefs library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
