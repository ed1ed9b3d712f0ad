//! Cache path derivation.

use super::types::CacheKey;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Root of the cache subtree for one language.
pub fn language_dir(cache_dir: &Path, language: &str) -> PathBuf {
    cache_dir.join(language)
}

/// Location of the `ext` subtitle cached for `key`.
///
/// Only normal components of the video's directory are mirrored, so the
/// result always stays inside the language subtree. Returns `None` for a
/// video path without a file name.
pub fn entry_path(cache_dir: &Path, key: &CacheKey, ext: &str) -> Option<PathBuf> {
    let video = key.video();
    let stem = video.file_stem()?;
    let parent = video.parent()?;

    let mut path = language_dir(cache_dir, key.language());
    for component in parent.components() {
        if let Component::Normal(part) = component {
            path.push(part);
        }
    }

    let mut name = OsString::from(stem);
    name.push(".");
    name.push(ext);
    path.push(name);
    Some(path)
}

/// Directory a cache subdirectory mirrors, given its path relative to the
/// language subtree.
pub(super) fn mirrored_source_dir(relative: &Path) -> PathBuf {
    Path::new("/").join(relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_path_mirrors_video_dir() {
        let key = CacheKey::new("/srv/videos/films/movie.mkv", "eng");
        let path = entry_path(Path::new("/tmp/.subtitlefs"), &key, "srt").unwrap();
        assert_eq!(
            path,
            PathBuf::from("/tmp/.subtitlefs/eng/srv/videos/films/movie.srt")
        );
    }

    #[test]
    fn test_entry_path_keeps_inner_dots() {
        let key = CacheKey::new("/v/Show.S01E01.1080p.mkv", "eng");
        let path = entry_path(Path::new("/c"), &key, "ass").unwrap();
        assert_eq!(path, PathBuf::from("/c/eng/v/Show.S01E01.1080p.ass"));
    }

    #[test]
    fn test_entry_path_separates_languages() {
        let eng = entry_path(Path::new("/c"), &CacheKey::new("/v/a.mkv", "eng"), "srt");
        let fre = entry_path(Path::new("/c"), &CacheKey::new("/v/a.mkv", "fre"), "srt");
        assert_ne!(eng, fre);
    }

    #[test]
    fn test_entry_path_ignores_parent_components() {
        let key = CacheKey::new("/v/../../etc/a.mkv", "eng");
        let path = entry_path(Path::new("/c"), &key, "srt").unwrap();
        assert!(path.starts_with("/c/eng"));
    }

    #[test]
    fn test_entry_path_without_file_name() {
        assert!(entry_path(Path::new("/c"), &CacheKey::new("/", "eng"), "srt").is_none());
    }

    #[test]
    fn test_mirrored_source_dir() {
        assert_eq!(
            mirrored_source_dir(Path::new("srv/videos")),
            PathBuf::from("/srv/videos")
        );
    }
}
