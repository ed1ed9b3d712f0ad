//! `-o key=value,...` mount option strings.
//!
//! Recognized keys: `root`, `lang`, `cachedir`, `use_cache_only`, `log`,
//! `loglevel`. Anything else is kept verbatim in [`MountOptionSet::other`].

use super::file::{expand_tilde, ConfigFileError};
use std::path::PathBuf;

/// Options parsed from one or more `-o` arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountOptionSet {
    pub root: Option<PathBuf>,
    pub language: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub cache_only: Option<bool>,
    pub log_file: Option<PathBuf>,
    pub log_level: Option<String>,
    pub other: Vec<String>,
}

impl MountOptionSet {
    /// Parse every `-o` argument, later values overriding earlier ones.
    pub fn parse<I, S>(args: I) -> Result<Self, ConfigFileError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for arg in args {
            for option in arg.as_ref().split(',') {
                let option = option.trim();
                if option.is_empty() {
                    continue;
                }
                set.apply(option)?;
            }
        }
        Ok(set)
    }

    fn apply(&mut self, option: &str) -> Result<(), ConfigFileError> {
        let (key, value) = match option.split_once('=') {
            Some((key, value)) => (key.trim(), Some(value.trim())),
            None => (option, None),
        };

        match (key, value) {
            ("root", Some(v)) if !v.is_empty() => self.root = Some(expand_tilde(v)),
            ("lang", Some(v)) if !v.is_empty() => self.language = Some(v.to_string()),
            ("cachedir", Some(v)) if !v.is_empty() => self.cache_dir = Some(expand_tilde(v)),
            ("log", Some(v)) if !v.is_empty() => self.log_file = Some(expand_tilde(v)),
            ("loglevel", Some(v)) if !v.is_empty() => {
                self.log_level = Some(v.to_ascii_lowercase())
            }
            ("use_cache_only", None) => self.cache_only = Some(true),
            ("use_cache_only", Some(v)) => {
                self.cache_only = Some(match v.to_ascii_lowercase().as_str() {
                    "true" | "1" | "yes" | "on" => true,
                    "false" | "0" | "no" | "off" => false,
                    _ => return Err(invalid_option(key, v, "must be true or false")),
                })
            }
            ("root" | "lang" | "cachedir" | "log" | "loglevel", _) => {
                return Err(invalid_option(key, value.unwrap_or(""), "requires a value"))
            }
            _ => self.other.push(option.to_string()),
        }
        Ok(())
    }
}

fn invalid_option(key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: "options".to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
