//! FUSE host adapter.
//!
//! ```text
//! kernel ──► fuse3 session ──► SubtitleFuseFs ──► SubtitleFs
//!   (inodes)                    (InodeTable)       (mount-relative paths)
//! ```
//!
//! Every operation is an async task on the tokio runtime, so a slow
//! extraction for one file never stalls lookups of another.

mod filesystem;
mod inode;
mod types;

pub use filesystem::{to_file_attr, SubtitleFuseFs, TTL};
pub use inode::{InodeTable, ROOT_INODE};
pub use types::{MountError, MountHandle};

use crate::config::MountConfig;
use crate::demux::{Demuxer, MkvToolnixDemuxer};
use crate::facade::SubtitleFs;
use crate::log::{Logger, TracingLogger};
use crate::log_info;
use fuse3::MountOptions;
use std::path::Path;
use std::sync::Arc;

/// Mount the overlay described by `config` at `mountpoint`.
///
/// Locates MKVToolNix, prepares the cache directory and mounts read-only.
/// Background extraction starts when the kernel initializes the session.
pub async fn mount(config: Arc<MountConfig>, mountpoint: &Path) -> Result<MountHandle, MountError> {
    let demuxer = MkvToolnixDemuxer::for_mount(&config, Arc::new(TracingLogger::new("demuxer")))?;
    mount_with(config, Arc::new(demuxer), mountpoint).await
}

/// Mount with an explicit demuxer.
pub async fn mount_with(
    config: Arc<MountConfig>,
    demuxer: Arc<dyn Demuxer>,
    mountpoint: &Path,
) -> Result<MountHandle, MountError> {
    tokio::fs::create_dir_all(config.tmp_dir())
        .await
        .map_err(MountError::CacheDir)?;

    let logger: Arc<dyn Logger> = Arc::new(TracingLogger::new("fuse"));
    let facade = Arc::new(SubtitleFs::new(config.clone(), demuxer));
    let filesystem = SubtitleFuseFs::new(facade, logger.clone());

    let mut options = MountOptions::default();
    options.fs_name("subtitlefs");
    options.read_only(true);
    options.force_readdir_plus(false);
    options.no_open_dir_support(true);

    #[cfg(target_os = "linux")]
    let handle = fuse3::raw::Session::new(options)
        .mount_with_unprivileged(filesystem, mountpoint)
        .await
        .map_err(MountError::MountFailed)?;

    #[cfg(not(target_os = "linux"))]
    let handle = fuse3::raw::Session::new(options)
        .mount(filesystem, mountpoint)
        .await
        .map_err(MountError::MountFailed)?;

    log_info!(
        logger,
        "Mounted {} at {} (language {}, cache {})",
        config.root().display(),
        mountpoint.display(),
        config.language(),
        config.cache_dir().display()
    );
    Ok(MountHandle::new(handle))
}
