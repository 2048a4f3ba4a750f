//! Filesystem side of change detection.
//!
//! - [`walk`] lazily enumerates every file under a content folder.
//! - [`ContentFilter`] decides which paths are indexed, by regular expression.
//! - [`modified_time`] reads a file's mtime in whole seconds.

use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The path disappeared between being listed and being inspected.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            ScanError::NotFound(path.to_path_buf())
        } else {
            ScanError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Walk `root` recursively, yielding the canonical path of every entry that is
/// not a directory. Nothing is collected up front; each call starts a fresh
/// walk.
///
/// Symlinks are resolved, so a file reached through a link is yielded under
/// its target's path and may appear more than once.
pub fn walk(
    root: &Path,
    follow_symlinks: bool,
) -> Result<impl Iterator<Item = Result<PathBuf, ScanError>>, ScanError> {
    let root = root
        .canonicalize()
        .map_err(|e| ScanError::from_io(root, e))?;

    let walker = WalkDir::new(root)
        .follow_links(follow_symlinks)
        .sort_by_file_name()
        .into_iter();

    Ok(walker.filter_map(|entry| match entry {
        Ok(entry) if entry.file_type().is_dir() => None,
        Ok(entry) => resolve_entry(entry.path()).transpose(),
        Err(err) => {
            let path = err.path().map(Path::to_path_buf).unwrap_or_default();
            let source = err
                .into_io_error()
                .unwrap_or_else(|| io::Error::other("filesystem loop detected"));
            Some(Err(ScanError::from_io(&path, source)))
        }
    }))
}

/// Canonical path of a walked entry, or `None` for a link to a directory.
fn resolve_entry(path: &Path) -> Result<Option<PathBuf>, ScanError> {
    let canonical = path
        .canonicalize()
        .map_err(|e| ScanError::from_io(path, e))?;
    if canonical.is_dir() {
        return Ok(None);
    }
    Ok(Some(canonical))
}

/// Path filter matching the configured `content_regex`.
///
/// The expression must match from the start of the path string, and is case
/// sensitive: `.*\.md$` accepts `notes.md` but not `README.MD`.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    regex: Regex,
}

impl ContentFilter {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})", pattern))?;
        Ok(Self { regex })
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.regex.is_match(&path.to_string_lossy())
    }
}

/// Modification time of `path` in whole seconds since the epoch.
///
/// Sub-second precision is discarded. Times before the epoch read as `0`.
pub fn modified_time(path: &Path) -> Result<i64, ScanError> {
    let metadata = std::fs::metadata(path).map_err(|e| ScanError::from_io(path, e))?;
    let modified = metadata
        .modified()
        .map_err(|e| ScanError::from_io(path, e))?;
    Ok(to_epoch_secs(modified))
}

fn to_epoch_secs(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
