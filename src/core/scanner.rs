//! Tree filter: lists or copies the files of a content folder that pass a [`ContentFilter`].

use super::error::CoreError;
use super::filter::ContentFilter;
use crate::utils::path::relative_slash_path;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// What a filtered copy did.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub files_copied: usize,
    pub files_skipped: usize,
    pub directories_created: usize,
    pub bytes_copied: u64,
}

/// True for walk errors that only affect one entry: a dangling symlink, an entry removed
/// mid-walk, or a symlink loop. Both modes skip these.
fn is_skippable(error: &walkdir::Error) -> bool {
    error.loop_ancestor().is_some()
        || error
            .io_error()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
}

/// Lists every file below `root` that `filter` includes, relative to `root` with `/` separators.
///
/// Directories are always descended; only files are tested, so a directory-name pattern such
/// as `.git` excludes through each descendant's path. Symlinks are followed, so a linked
/// directory is listed through its files and a dangling link is skipped. The result is sorted.
/// A missing root or a root that is not a directory yields an empty list.
pub fn list_filtered_relative_paths(filter: &ContentFilter, root: &Path) -> Vec<String> {
    if !root.is_dir() {
        tracing::warn!("Content folder does not exist or is not a directory: {:?}", root);
        return Vec::new();
    }

    let candidates: Vec<String> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {:?}: {}", root, e);
                None
            }
        })
        .filter(|entry| !entry.file_type().is_dir())
        .filter_map(|entry| relative_slash_path(root, entry.path()).ok())
        .collect();

    let total = candidates.len();
    let mut included: Vec<String> = candidates
        .into_par_iter()
        .filter(|relative| filter.should_include(relative, Some(root)))
        .collect();
    included.sort();

    tracing::info!(
        "📂 {} of {} file(s) under {:?} pass the filter",
        included.len(),
        total,
        root
    );
    included
}

/// Runs [`list_filtered_relative_paths`] on tokio's blocking pool.
pub async fn list_filtered_relative_paths_async(
    filter: Arc<ContentFilter>,
    root: PathBuf,
) -> Result<Vec<String>, CoreError> {
    let listing =
        tokio::task::spawn_blocking(move || list_filtered_relative_paths(&filter, &root)).await?;
    Ok(listing)
}

/// Copies the included files of `source` into `destination`, mirroring its directory layout.
///
/// Every source directory is created in the destination as it is reached, whether or not any
/// file inside it ends up included. Inclusion is always decided against `source`, never against
/// the copy. Symlinks are resolved the same way as in [`list_filtered_relative_paths`]: linked
/// directories are mirrored, linked files copied by content, dangling links skipped.
pub fn copy_filtered(
    filter: &ContentFilter,
    source: &Path,
    destination: &Path,
) -> Result<CopySummary, CoreError> {
    if !source.is_dir() {
        return Err(CoreError::NotADirectory(source.to_path_buf()));
    }

    let mut summary = CopySummary::default();
    if !destination.exists() {
        fs::create_dir_all(destination).map_err(CoreError::io(destination))?;
        summary.directories_created += 1;
    }

    for entry in WalkDir::new(source).follow_links(true).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if is_skippable(&e) => {
                tracing::warn!("Skipping unreadable entry under {:?}: {}", source, e);
                continue;
            }
            Err(e) => {
                let path = e.path().unwrap_or(source).to_path_buf();
                return Err(CoreError::Io(e.into(), path));
            }
        };
        let relative = relative_slash_path(source, entry.path())?;
        let target = destination.join(entry.path().strip_prefix(source)?);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(CoreError::io(&target))?;
            summary.directories_created += 1;
            continue;
        }

        if !filter.should_include(&relative, Some(source)) {
            tracing::debug!("Skipping excluded file {}", relative);
            summary.files_skipped += 1;
            continue;
        }

        let bytes = fs::copy(entry.path(), &target).map_err(CoreError::io(entry.path()))?;
        summary.files_copied += 1;
        summary.bytes_copied += bytes;
    }

    tracing::info!(
        "✅ Filtered copy of {:?} complete: {} copied, {} skipped",
        source,
        summary.files_copied,
        summary.files_skipped
    );
    Ok(summary)
}
