//! File scanning backend
//!
//! Uses the ignore crate's walker to enumerate YAML manifests under a root.
//! Each extension class is walked separately so a failure in one never hides the other.

use anyhow::Result;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::core::error::ScanError;
use crate::core::model::{ResultItem, ResultSet};
use crate::core::paths::make_relative;
use crate::core::render::{RenderConfig, Renderer};

/// Extensions scanned for manifests
pub const YAML_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Walker switches
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Skip hidden files and directories
    pub skip_hidden: bool,
    /// Honor .gitignore and friends
    pub respect_ignore: bool,
}

/// Find every file under `root` whose extension is `extension`
pub fn find_files_matching(
    root: &Path,
    extension: &str,
    options: ScanOptions,
) -> std::result::Result<Vec<PathBuf>, ScanError> {
    if let Err(source) = std::fs::read_dir(root) {
        return Err(ScanError {
            root: root.to_path_buf(),
            extension: extension.to_string(),
            source,
        });
    }

    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .hidden(options.skip_hidden)
        .git_ignore(options.respect_ignore)
        .git_global(options.respect_ignore)
        .git_exclude(options.respect_ignore)
        .ignore(options.respect_ignore)
        .parents(options.respect_ignore)
        .require_git(false)
        .follow_links(false);

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!(root = %root.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };

        let path = entry.path();
        let matches_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == extension)
            .unwrap_or(false);

        // is_file follows symlinks so linked manifests are scanned too
        if matches_extension && path.is_file() {
            files.push(path.to_path_buf());
        }
    }

    debug!(root = %root.display(), extension, count = files.len(), "extension class scanned");
    Ok(files)
}

/// Collect candidate manifests for every YAML extension class
///
/// A class that cannot be enumerated is logged and contributes nothing.
pub fn candidate_files(root: &Path, options: ScanOptions) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for extension in YAML_EXTENSIONS {
        match find_files_matching(root, extension, options) {
            Ok(found) => files.extend(found),
            Err(err) => warn!(error = %err, "extension class skipped"),
        }
    }

    files.sort();
    files.dedup();
    files
}

/// Run the scan command
pub fn run_scan(root: &Path, options: ScanOptions, config: RenderConfig) -> Result<()> {
    let result_set: ResultSet = candidate_files(root, options)
        .iter()
        .map(|path| {
            ResultItem::file(make_relative(path, root).unwrap_or_else(|| path.display().to_string()))
        })
        .collect();

    let renderer = Renderer::with_config(config);
    println!("{}", renderer.render(&result_set));

    Ok(())
}
