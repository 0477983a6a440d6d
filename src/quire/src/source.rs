//! Classification of command sources and glob expansion.
//!
//! A string source is either an absolute path to a single command file or an
//! absolute glob matching many of them. Globs are recognized by the presence
//! of one of `*`, `?`, `[` or `{`; absoluteness follows
//! [`Path::is_absolute`] for the current platform.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ConfigError;

/// Extension of command files. Extensionless files are accepted too.
pub const COMMAND_FILE_EXTENSION: &str = "rs";

const GLOB_METACHARACTERS: [char; 4] = ['*', '?', '[', '{'];

/// A classified string source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    File(PathBuf),
    Glob(String),
}

/// Check whether a string looks like a glob pattern.
pub fn is_glob(source: &str) -> bool {
    source.contains(GLOB_METACHARACTERS)
}

/// Classify the source declared at `index`, without touching the filesystem.
pub fn classify(index: usize, source: &str) -> Result<SourceKind, ConfigError> {
    if !Path::new(source).is_absolute() {
        return Err(ConfigError::NotAbsolute {
            index,
            path: source.to_string(),
        });
    }

    if is_glob(source) {
        Ok(SourceKind::Glob(source.to_string()))
    } else {
        Ok(SourceKind::File(PathBuf::from(source)))
    }
}

/// Check whether a glob match may be used as a command file.
pub fn has_command_extension(path: &Path) -> bool {
    path.extension()
        .is_none_or(|ext| ext == COMMAND_FILE_EXTENSION)
}

/// Lists the files matched by a glob pattern.
pub trait GlobLister: Send + Sync {
    /// Return the matched files (directories excluded), in a stable order.
    fn list(&self, pattern: &str) -> Result<Vec<PathBuf>, ConfigError>;
}

/// Glob expansion against the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsGlob;

impl GlobLister for FsGlob {
    fn list(&self, pattern: &str) -> Result<Vec<PathBuf>, ConfigError> {
        let entries = glob::glob(pattern).map_err(|e| ConfigError::UnvalidGlob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        let mut files = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_dir() => {
                    debug!("Skipping directory {:?} matched by {}", path, pattern);
                }
                Ok(path) => files.push(path),
                Err(e) => {
                    warn!("Unreadable entry while expanding {}: {}", pattern, e);
                }
            }
        }

        Ok(files)
    }
}
