//! Inode ↔ mount-relative path mapping.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// The FUSE root inode.
pub const ROOT_INODE: u64 = 1;

/// Inode reported for directory entries the kernel has not looked up.
pub const UNKNOWN_INODE: u64 = 0xffff_ffff;

#[derive(Debug)]
struct Node {
    path: PathBuf,
    lookups: u64,
}

/// Assigns inode numbers to mount-relative paths the kernel holds.
///
/// The root is inode 1, maps to the empty path and is never dropped. Every
/// other mapping lives while its lookup count is positive: each
/// [`lookup`](Self::lookup) adds one, [`forget`](Self::forget) takes the
/// kernel's count away. Numbers are never reused.
#[derive(Debug)]
pub struct InodeTable {
    nodes: DashMap<u64, Node>,
    inodes: DashMap<PathBuf, u64>,
    next: AtomicU64,
}

impl InodeTable {
    pub fn new() -> Self {
        let table = Self {
            nodes: DashMap::new(),
            inodes: DashMap::new(),
            next: AtomicU64::new(ROOT_INODE + 1),
        };
        table.nodes.insert(
            ROOT_INODE,
            Node {
                path: PathBuf::new(),
                lookups: 0,
            },
        );
        table.inodes.insert(PathBuf::new(), ROOT_INODE);
        table
    }

    /// Inode for `path`, allocating one on first sight, with one more lookup
    /// recorded against it.
    pub fn lookup(&self, path: &Path) -> u64 {
        // Path entry first, node second; `forget` locks in the same order.
        match self.inodes.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => {
                let ino = *entry.get();
                if let Some(mut node) = self.nodes.get_mut(&ino) {
                    node.lookups += 1;
                }
                ino
            }
            Entry::Vacant(entry) => {
                let ino = self.next.fetch_add(1, Ordering::Relaxed);
                self.nodes.insert(
                    ino,
                    Node {
                        path: path.to_path_buf(),
                        lookups: 1,
                    },
                );
                entry.insert(ino);
                ino
            }
        }
    }

    /// Drop `nlookup` lookups of `ino`, removing the mapping at zero.
    pub fn forget(&self, ino: u64, nlookup: u64) {
        if ino == ROOT_INODE {
            return;
        }
        let Some(path) = self.path(ino) else {
            return;
        };

        if let Entry::Occupied(entry) = self.inodes.entry(path) {
            if *entry.get() != ino {
                return;
            }
            let gone = match self.nodes.get_mut(&ino) {
                Some(mut node) => {
                    node.lookups = node.lookups.saturating_sub(nlookup);
                    node.lookups == 0
                }
                None => true,
            };
            if gone {
                self.nodes.remove(&ino);
                entry.remove();
            }
        }
    }

    pub fn path(&self, ino: u64) -> Option<PathBuf> {
        self.nodes.get(&ino).map(|node| node.path.clone())
    }

    pub fn inode(&self, path: &Path) -> Option<u64> {
        self.inodes.get(path).map(|ino| *ino.value())
    }

    /// Inode of the directory containing `path` (the root is its own parent).
    pub fn parent_of(&self, path: &Path) -> u64 {
        path.parent()
            .and_then(|parent| self.inode(parent))
            .unwrap_or(ROOT_INODE)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_inode_one() {
        let table = InodeTable::new();
        assert_eq!(table.path(ROOT_INODE), Some(PathBuf::new()));
        assert_eq!(table.inode(Path::new("")), Some(ROOT_INODE));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_inodes_are_stable_and_unique() {
        let table = InodeTable::new();
        let a = table.lookup(Path::new("a"));
        let b = table.lookup(Path::new("dir/b.srt"));

        assert_ne!(a, b);
        assert_ne!(a, ROOT_INODE);
        assert_eq!(table.lookup(Path::new("a")), a);
        assert_eq!(table.path(b), Some(PathBuf::from("dir/b.srt")));
        assert_eq!(table.path(9999), None);
    }

    #[test]
    fn test_parent_of() {
        let table = InodeTable::new();
        let dir = table.lookup(Path::new("season1"));
        table.lookup(Path::new("season1/ep1.mkv"));

        assert_eq!(table.parent_of(Path::new("season1/ep1.mkv")), dir);
        assert_eq!(table.parent_of(Path::new("season1")), ROOT_INODE);
        assert_eq!(table.parent_of(Path::new("")), ROOT_INODE);
        assert_eq!(table.parent_of(Path::new("unknown/x")), ROOT_INODE);
    }

    #[test]
    fn test_forget_drops_mapping_after_last_lookup() {
        let table = InodeTable::new();
        let ino = table.lookup(Path::new("movie.srt"));
        table.lookup(Path::new("movie.srt"));
        table.lookup(Path::new("movie.srt"));

        table.forget(ino, 2);
        assert_eq!(table.path(ino), Some(PathBuf::from("movie.srt")));

        table.forget(ino, 1);
        assert_eq!(table.path(ino), None);
        assert_eq!(table.inode(Path::new("movie.srt")), None);
        assert_eq!(table.len(), 1);

        let again = table.lookup(Path::new("movie.srt"));
        assert_ne!(again, ino);
    }

    #[test]
    fn test_forget_ignores_root_and_unknown_inodes() {
        let table = InodeTable::new();
        table.forget(ROOT_INODE, 100);
        table.forget(9999, 1);

        assert_eq!(table.path(ROOT_INODE), Some(PathBuf::new()));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_table_shrinks_back_after_churn() {
        let table = InodeTable::new();
        let inodes: Vec<_> = (0..100)
            .map(|i| table.lookup(Path::new(&format!("dir/ep{i}.srt"))))
            .collect();
        assert_eq!(table.len(), 101);

        for ino in inodes {
            table.forget(ino, 1);
        }
        assert_eq!(table.len(), 1);
    }
}
