//! Path normalization utilities
//!
//! Files are identified by their canonical absolute path expressed as a `file://` URL,
//! so the same manifest reached through a symlink collapses to one identity.

use std::path::{Path, PathBuf};
use url::Url;

/// Normalize a path to use '/' as separator (for cross-platform consistency)
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Make a path relative to the root directory
pub fn make_relative(path: &Path, root: &Path) -> Option<String> {
    path.strip_prefix(root).ok().map(normalize_path)
}

/// Resolve symlinks and `..`; fall back to a lexically absolute path when the file
/// cannot be canonicalized (e.g. it vanished after the scan)
pub fn canonical_path(path: &Path) -> PathBuf {
    match path.canonicalize() {
        Ok(canonical) => canonical,
        Err(err) => {
            tracing::debug!(
                path = %path.display(),
                error = %err,
                "canonicalize failed, using absolute path"
            );
            std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
        }
    }
}

/// Express an absolute path as a `file://` URL
pub fn file_url(path: &Path) -> Option<Url> {
    Url::from_file_path(path).ok()
}
