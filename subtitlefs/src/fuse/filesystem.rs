//! `fuse3` adapter over [`SubtitleFs`].

use super::inode::{InodeTable, ROOT_INODE, UNKNOWN_INODE};
use crate::facade::{DirEntry, EntryKind, EntryStat, FsError, SubtitleFs};
use crate::log::Logger;
use crate::{log_error, log_trace};
use bytes::Bytes;
use fuse3::raw::prelude::*;
use fuse3::raw::reply::{
    DirectoryEntry, DirectoryEntryPlus, FileAttr, ReplyAttr, ReplyCreated, ReplyData, ReplyDirectory,
    ReplyEntry, ReplyInit, ReplyOpen, ReplyStatFs, ReplyWrite,
};
use fuse3::raw::Filesystem;
use fuse3::{Errno, FileType, Result as Fuse3Result, SetAttr};
use futures::stream::{self, BoxStream, StreamExt};
use std::ffi::{OsStr, OsString};
use std::num::NonZeroU32;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

/// Attribute and entry cache lifetime handed to the kernel.
pub const TTL: Duration = Duration::from_secs(1);

const MAX_WRITE: u32 = 128 * 1024;
const BLOCK_SIZE: u32 = 4096;

fn errno(e: FsError) -> Errno {
    Errno::from(e.errno())
}

fn read_only() -> Errno {
    Errno::from(libc::EROFS)
}

fn file_type(kind: EntryKind) -> FileType {
    match kind {
        EntryKind::Directory => FileType::Directory,
        EntryKind::Symlink => FileType::Symlink,
        EntryKind::File => FileType::RegularFile,
    }
}

/// Kernel attributes for a stat. Synthetic entries are always 0444.
pub fn to_file_attr(ino: u64, stat: &EntryStat) -> FileAttr {
    let meta = &stat.metadata;
    let kind = if meta.is_dir() {
        FileType::Directory
    } else if meta.file_type().is_symlink() {
        FileType::Symlink
    } else {
        FileType::RegularFile
    };
    let perm = if stat.is_synthetic() {
        0o444
    } else {
        (meta.mode() & 0o7777) as u16
    };
    let mtime = meta.modified().unwrap_or(UNIX_EPOCH);

    FileAttr {
        ino,
        size: stat.size,
        blocks: stat.size.div_ceil(512),
        atime: meta.accessed().unwrap_or(UNIX_EPOCH).into(),
        mtime: mtime.into(),
        ctime: mtime.into(),
        kind,
        perm,
        nlink: if stat.is_synthetic() { 1 } else { meta.nlink() as u32 },
        uid: meta.uid(),
        gid: meta.gid(),
        rdev: meta.rdev() as u32,
        blksize: BLOCK_SIZE,
    }
}

/// The subtitle overlay as a `fuse3` raw filesystem.
pub struct SubtitleFuseFs {
    fs: Arc<SubtitleFs>,
    inodes: InodeTable,
    logger: Arc<dyn Logger>,
}

impl SubtitleFuseFs {
    pub fn new(fs: Arc<SubtitleFs>, logger: Arc<dyn Logger>) -> Self {
        Self {
            fs,
            inodes: InodeTable::new(),
            logger,
        }
    }

    pub fn facade(&self) -> &SubtitleFs {
        &self.fs
    }

    pub fn inodes(&self) -> &InodeTable {
        &self.inodes
    }

    fn path_of(&self, ino: u64) -> Fuse3Result<PathBuf> {
        self.inodes.path(ino).ok_or_else(|| Errno::from(libc::ENOENT))
    }

    fn child_of(&self, parent: u64, name: &OsStr) -> Fuse3Result<PathBuf> {
        Ok(self.path_of(parent)?.join(name))
    }

    /// Entries keep the inode the kernel already holds; plain readdir does
    /// not add a lookup, so unseen names get no mapping.
    fn directory_entry(&self, dir: &std::path::Path, entry: DirEntry) -> DirectoryEntry {
        let inode = self
            .inodes
            .inode(&dir.join(&entry.name))
            .unwrap_or(UNKNOWN_INODE);
        DirectoryEntry {
            inode,
            kind: file_type(entry.kind),
            name: entry.name,
            offset: 0,
        }
    }
}

impl Filesystem for SubtitleFuseFs {
    type DirEntryStream<'a>
        = BoxStream<'a, Fuse3Result<DirectoryEntry>>
    where
        Self: 'a;
    type DirEntryPlusStream<'a>
        = BoxStream<'a, Fuse3Result<DirectoryEntryPlus>>
    where
        Self: 'a;

    async fn init(&self, _req: Request) -> Fuse3Result<ReplyInit> {
        self.fs.on_mount_start().await.map_err(|e| {
            log_error!(self.logger, "Mount start failed: {}", e);
            errno(e)
        })?;
        Ok(ReplyInit {
            max_write: NonZeroU32::new(MAX_WRITE).unwrap_or(NonZeroU32::MIN),
        })
    }

    async fn destroy(&self, _req: Request) {
        self.fs.on_mount_stop().await;
    }

    async fn lookup(&self, _req: Request, parent: u64, name: &OsStr) -> Fuse3Result<ReplyEntry> {
        let path = self.child_of(parent, name)?;
        log_trace!(self.logger, "lookup {}", path.display());

        let stat = self.fs.getattr(&path).await.map_err(errno)?;
        let ino = self.inodes.lookup(&path);
        Ok(ReplyEntry {
            ttl: TTL,
            attr: to_file_attr(ino, &stat),
            generation: 0,
        })
    }

    async fn forget(&self, _req: Request, inode: u64, nlookup: u64) {
        log_trace!(self.logger, "forget {} x{}", inode, nlookup);
        self.inodes.forget(inode, nlookup);
    }

    /// fuse3 drops the per-inode counts here; the kernel only batches
    /// inodes it is evicting, so each one is forgotten entirely.
    async fn batch_forget(&self, _req: Request, inodes: &[u64]) {
        for &inode in inodes {
            self.inodes.forget(inode, u64::MAX);
        }
    }

    async fn getattr(
        &self,
        _req: Request,
        ino: u64,
        _fh: Option<u64>,
        _flags: u32,
    ) -> Fuse3Result<ReplyAttr> {
        let path = self.path_of(ino)?;
        let stat = self.fs.getattr(&path).await.map_err(errno)?;
        Ok(ReplyAttr {
            ttl: TTL,
            attr: to_file_attr(ino, &stat),
        })
    }

    async fn setattr(
        &self,
        _req: Request,
        _ino: u64,
        _fh: Option<u64>,
        _set_attr: SetAttr,
    ) -> Fuse3Result<ReplyAttr> {
        Err(read_only())
    }

    async fn mknod(
        &self,
        _req: Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _rdev: u32,
    ) -> Fuse3Result<ReplyEntry> {
        let path = self.child_of(parent, name)?;
        Err(self.fs.mknod(&path, mode).err().map_or_else(read_only, errno))
    }

    async fn mkdir(
        &self,
        _req: Request,
        _parent: u64,
        _name: &OsStr,
        _mode: u32,
        _umask: u32,
    ) -> Fuse3Result<ReplyEntry> {
        Err(read_only())
    }

    async fn unlink(&self, _req: Request, _parent: u64, _name: &OsStr) -> Fuse3Result<()> {
        Err(read_only())
    }

    async fn rmdir(&self, _req: Request, _parent: u64, _name: &OsStr) -> Fuse3Result<()> {
        Err(read_only())
    }

    async fn rename(
        &self,
        _req: Request,
        _parent: u64,
        _name: &OsStr,
        _new_parent: u64,
        _new_name: &OsStr,
    ) -> Fuse3Result<()> {
        Err(read_only())
    }

    async fn open(&self, _req: Request, ino: u64, flags: u32) -> Fuse3Result<ReplyOpen> {
        let path = self.path_of(ino)?;
        let fh = self.fs.open(&path, flags as i32).await.map_err(errno)?;
        Ok(ReplyOpen { fh, flags: 0 })
    }

    async fn read(
        &self,
        _req: Request,
        _ino: u64,
        fh: u64,
        offset: u64,
        size: u32,
    ) -> Fuse3Result<ReplyData> {
        let data = self.fs.read(fh, offset, size).await.map_err(errno)?;
        Ok(ReplyData {
            data: Bytes::from(data),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn write(
        &self,
        _req: Request,
        ino: u64,
        _fh: u64,
        offset: u64,
        data: &[u8],
        _write_flags: u32,
        _flags: u32,
    ) -> Fuse3Result<ReplyWrite> {
        let path = self.path_of(ino)?;
        let written = self.fs.write(&path, offset, data).map_err(errno)?;
        Ok(ReplyWrite { written })
    }

    async fn create(
        &self,
        _req: Request,
        _parent: u64,
        _name: &OsStr,
        _mode: u32,
        _flags: u32,
    ) -> Fuse3Result<ReplyCreated> {
        Err(read_only())
    }

    async fn release(
        &self,
        _req: Request,
        _ino: u64,
        fh: u64,
        _flags: u32,
        _lock_owner: u64,
        _flush: bool,
    ) -> Fuse3Result<()> {
        self.fs.release(fh).map_err(errno)
    }

    async fn flush(&self, _req: Request, _ino: u64, _fh: u64, _lock_owner: u64) -> Fuse3Result<()> {
        Ok(())
    }

    async fn fsync(&self, _req: Request, _ino: u64, fh: u64, datasync: bool) -> Fuse3Result<()> {
        self.fs.fsync(fh, datasync).await.map_err(errno)
    }

    async fn opendir(&self, _req: Request, _ino: u64, _flags: u32) -> Fuse3Result<ReplyOpen> {
        Ok(ReplyOpen { fh: 0, flags: 0 })
    }

    async fn readdir(
        &self,
        _req: Request,
        ino: u64,
        _fh: u64,
        offset: i64,
    ) -> Fuse3Result<ReplyDirectory<Self::DirEntryStream<'_>>> {
        let dir = self.path_of(ino)?;
        log_trace!(self.logger, "readdir {} from {}", dir.display(), offset);
        let listing = self.fs.readdir(&dir, 0).await.map_err(errno)?;

        let dots = vec![
            DirectoryEntry {
                inode: ino,
                kind: FileType::Directory,
                name: OsString::from("."),
                offset: 0,
            },
            DirectoryEntry {
                inode: if ino == ROOT_INODE {
                    ROOT_INODE
                } else {
                    self.inodes.parent_of(&dir)
                },
                kind: FileType::Directory,
                name: OsString::from(".."),
                offset: 0,
            },
        ];

        let entries = stream::iter(dots.into_iter().map(Ok))
            .chain(listing.map(move |entry| match entry {
                Ok(entry) => Ok(self.directory_entry(&dir, entry)),
                Err(e) => Err(errno(e)),
            }))
            .enumerate()
            .map(|(index, entry)| {
                entry.map(|mut entry| {
                    entry.offset = index as i64 + 1;
                    entry
                })
            })
            .skip(offset.max(0) as usize)
            .boxed();

        Ok(ReplyDirectory { entries })
    }

    async fn access(&self, _req: Request, _ino: u64, _mask: u32) -> Fuse3Result<()> {
        Ok(())
    }

    async fn statfs(&self, _req: Request, _ino: u64) -> Fuse3Result<ReplyStatFs> {
        Ok(ReplyStatFs {
            blocks: 0,
            bfree: 0,
            bavail: 0,
            files: self.inodes.len() as u64,
            ffree: 0,
            bsize: BLOCK_SIZE,
            namelen: 255,
            frsize: BLOCK_SIZE,
        })
    }
}
