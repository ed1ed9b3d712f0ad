//! On-disk subtitle cache.
//!
//! Extracted subtitles live under `<cache_dir>/<language>/`, in a tree that
//! mirrors the absolute location of each source video:
//!
//! ```text
//! /srv/videos/films/movie.mkv
//!   → <cache_dir>/eng/srv/videos/films/movie.srt
//!   → <cache_dir>/eng/srv/videos/films/movie.ass
//! ```
//!
//! There is no index. A cache file is valid exactly when its modification
//! time equals its video's, so touching or replacing a video invalidates
//! every subtitle extracted from it.
//!
//! All writes go through [`CacheStore::put`], which serializes callers per
//! (video, language) key via [`ExtractionGate`].

mod gate;
mod path;
mod store;
mod types;

pub use gate::{ExtractionGate, GateGuard, GateStats};
pub use path::{entry_path, language_dir};
pub use store::CacheStore;
pub use types::{CacheError, CacheKey, CacheStats, PruneReport};
