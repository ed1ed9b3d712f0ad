//! Arguments shared by several commands.

use crate::runner::MountOverrides;
use clap::Args;
use std::path::PathBuf;

/// Which tree, language and cache a command works on.
#[derive(Debug, Clone, Default, Args)]
pub struct TargetArgs {
    /// Source directory containing the videos
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Three-letter subtitle language code (default: eng)
    #[arg(long = "lang")]
    pub language: Option<String>,

    /// Cache directory (default: /tmp/.subtitlefs)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,
}

impl TargetArgs {
    pub fn overrides(&self) -> MountOverrides {
        MountOverrides {
            root: self.root.clone(),
            language: self.language.clone(),
            cache_dir: self.cache_dir.clone(),
            cache_only: None,
        }
    }
}
