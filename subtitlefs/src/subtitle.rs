//! Subtitle format and file-extension tables.
//!
//! Containers tag every subtitle track with a codec identifier; the fixed
//! table here maps those identifiers to the file extension a player expects.
//! Only text formats are ever rendered into the cache.

use std::path::Path;

/// Extensions that may name a virtual subtitle file.
pub const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "sub", "idx", "ssa", "ass"];

/// Extensions of the video containers the overlay understands.
pub const VIDEO_EXTENSIONS: &[&str] = &["mkv"];

/// Track type reported for subtitle streams.
pub const SUBTITLE_TRACK_TYPE: &str = "subtitles";

/// Subtitle encodings with a known file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubtitleFormat {
    /// SubRip text (`S_TEXT/UTF8`)
    Srt,
    /// SubStation Alpha (`S_TEXT/SSA`)
    Ssa,
    /// Advanced SubStation Alpha (`S_TEXT/ASS`)
    Ass,
    /// Image-based VobSub (`S_VOBSUB`); recognized but never rendered
    VobSub,
}

impl SubtitleFormat {
    /// Formats that are extracted into the cache and served.
    pub const RENDERABLE: [SubtitleFormat; 3] =
        [SubtitleFormat::Srt, SubtitleFormat::Ssa, SubtitleFormat::Ass];

    /// Map a container codec identifier to a format.
    ///
    /// Unknown identifiers have no format.
    pub fn from_codec_id(codec_id: &str) -> Option<Self> {
        match codec_id {
            "S_TEXT/UTF8" => Some(Self::Srt),
            "S_TEXT/SSA" => Some(Self::Ssa),
            "S_TEXT/ASS" => Some(Self::Ass),
            "S_VOBSUB" => Some(Self::VobSub),
            _ => None,
        }
    }

    /// Map a file extension (case-insensitive) back to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "srt" => Some(Self::Srt),
            "ssa" => Some(Self::Ssa),
            "ass" => Some(Self::Ass),
            "sub" => Some(Self::VobSub),
            _ => None,
        }
    }

    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::Ssa => "ssa",
            Self::Ass => "ass",
            Self::VobSub => "sub",
        }
    }

    /// Whether tracks of this format are cached and exposed.
    pub fn is_renderable(self) -> bool {
        Self::RENDERABLE.contains(&self)
    }
}

/// Lower-cased extension of a path, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Whether `ext` is one of the subtitle extensions.
pub fn is_subtitle_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    SUBTITLE_EXTENSIONS.contains(&ext.as_str())
}

/// Whether `ext` is one of the registered video extensions.
pub fn is_video_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    VIDEO_EXTENSIONS.contains(&ext.as_str())
}

/// Whether the path names a video container by its final extension.
pub fn is_video_path(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| is_video_extension(&ext))
}

/// Whether any dot-separated segment after the first names a video
/// extension.
///
/// `movie.mkv` and `movie.mkv.bak` both qualify; `movie.txt` does not.
pub fn has_video_segment(file_name: &str) -> bool {
    file_name
        .split('.')
        .skip(1)
        .any(is_video_extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_codec_table() {
        assert_eq!(
            SubtitleFormat::from_codec_id("S_TEXT/UTF8"),
            Some(SubtitleFormat::Srt)
        );
        assert_eq!(
            SubtitleFormat::from_codec_id("S_TEXT/SSA"),
            Some(SubtitleFormat::Ssa)
        );
        assert_eq!(
            SubtitleFormat::from_codec_id("S_TEXT/ASS"),
            Some(SubtitleFormat::Ass)
        );
        assert_eq!(
            SubtitleFormat::from_codec_id("S_VOBSUB"),
            Some(SubtitleFormat::VobSub)
        );
        assert_eq!(SubtitleFormat::from_codec_id("S_HDMV/PGS"), None);
    }

    #[test]
    fn test_vobsub_is_not_renderable() {
        assert!(!SubtitleFormat::VobSub.is_renderable());
        assert!(SubtitleFormat::Srt.is_renderable());
        assert!(SubtitleFormat::Ssa.is_renderable());
        assert!(SubtitleFormat::Ass.is_renderable());
    }

    #[test]
    fn test_extension_round_trip_is_case_insensitive() {
        assert_eq!(SubtitleFormat::from_extension("ASS"), Some(SubtitleFormat::Ass));
        assert_eq!(SubtitleFormat::from_extension("idx"), None);
        assert_eq!(SubtitleFormat::Ssa.extension(), "ssa");
    }

    #[test]
    fn test_extension_predicates() {
        assert!(is_subtitle_extension("SRT"));
        assert!(is_subtitle_extension("idx"));
        assert!(!is_subtitle_extension("mkv"));
        assert!(is_video_extension("MKV"));
        assert!(!is_video_extension("mp4"));
        assert!(is_video_path(&PathBuf::from("/videos/Movie.MKV")));
        assert!(!is_video_path(&PathBuf::from("/videos/movie")));
    }

    #[test]
    fn test_has_video_segment() {
        assert!(has_video_segment("movie.mkv"));
        assert!(has_video_segment("movie.mkv.bak"));
        assert!(!has_video_segment("movie.srt"));
        assert!(!has_video_segment("mkv"));
    }
}
