//! Filesystem document source.
//!
//! Walks a directory tree, pruning any directory or file whose base name
//! matches an ignore glob, then reads the surviving files as UTF-8 with
//! bounded concurrency. Unreadable files (binary content, permission
//! errors, races with deletion) are skipped and counted, never fatal.

use anyhow::{bail, Result};
use futures::stream::{self, StreamExt};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use context_scanner_core::models::Document;

/// Base-name ignore matcher.
#[derive(Debug, Clone)]
pub struct IgnoreSet {
    set: GlobSet,
}

impl IgnoreSet {
    pub fn new(patterns: &[String]) -> Result<Self> {
        Ok(Self {
            set: build_globset(patterns)?,
        })
    }

    /// True when the final path component matches any pattern.
    pub fn is_ignored(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.set.is_match(Path::new(name)))
            .unwrap_or(false)
    }
}

/// Readable documents plus the number of files that could not be read.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub documents: Vec<Document>,
    pub skipped: usize,
}

/// Collect candidate file paths under `root`, sorted.
///
/// Ignored directories are pruned before descent, so nothing below them
/// is ever visited. The root itself is never ignored.
pub fn walk_files(root: &Path, ignore: &IgnoreSet, follow_symlinks: bool) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        bail!("Directory does not exist: {}", root.display());
    }

    let walker = WalkDir::new(root)
        .follow_links(follow_symlinks)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !ignore.is_ignored(entry.path()));

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if is_candidate_file(&entry) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Regular files, plus symlinks that resolve to one.
///
/// Directory symlinks are only descended with `follow_symlinks`. A dangling
/// symlink is kept so its failed read is counted as skipped.
fn is_candidate_file(entry: &walkdir::DirEntry) -> bool {
    if entry.file_type().is_file() {
        return true;
    }
    if !entry.path_is_symlink() {
        return false;
    }
    match std::fs::metadata(entry.path()) {
        Ok(meta) => meta.is_file(),
        Err(_) => true,
    }
}

/// Walk `root` and read every non-ignored file as text.
///
/// Documents are keyed by their path as joined from `root` (for example
/// `./src/main.rs` when `root` is `.`) and returned sorted by that key.
pub async fn scan_documents(
    root: &Path,
    ignore: &IgnoreSet,
    follow_symlinks: bool,
    read_concurrency: usize,
) -> Result<ScanOutcome> {
    let files = walk_files(root, ignore, follow_symlinks)?;

    let reads: Vec<Option<Document>> = stream::iter(files)
        .map(|path| async move {
            match tokio::fs::read_to_string(&path).await {
                Ok(body) => Some(Document::new(path.display().to_string(), body)),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable file");
                    None
                }
            }
        })
        .buffer_unordered(read_concurrency.max(1))
        .collect()
        .await;

    let mut outcome = ScanOutcome::default();
    for read in reads {
        match read {
            Some(doc) => outcome.documents.push(doc),
            None => outcome.skipped += 1,
        }
    }
    outcome
        .documents
        .sort_by(|a, b| a.source_id.cmp(&b.source_id));
    Ok(outcome)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
