//! Mount errors and the mounted-filesystem handle.

use crate::config::ConfigError;
use crate::demux::DemuxError;
use fuse3::raw::MountHandle as Fuse3MountHandle;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;

/// Errors that prevent a mount from coming up.
#[derive(Debug, Error)]
pub enum MountError {
    #[error("invalid mount configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("subtitle tools unavailable: {0}")]
    Demuxer(#[from] DemuxError),

    #[error("cannot prepare cache directory: {0}")]
    CacheDir(#[source] io::Error),

    #[error("mount failed: {0}")]
    MountFailed(#[source] io::Error),
}

/// A mounted filesystem.
///
/// Awaiting the handle resolves when the filesystem is unmounted from
/// outside (`fusermount -u`); [`MountHandle::unmount`] unmounts it from here.
/// Dropping the handle also unmounts.
pub struct MountHandle {
    inner: Fuse3MountHandle,
}

impl MountHandle {
    pub(crate) fn new(inner: Fuse3MountHandle) -> Self {
        Self { inner }
    }

    pub async fn unmount(self) -> io::Result<()> {
        self.inner.unmount().await
    }
}

impl Future for MountHandle {
    type Output = io::Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}
