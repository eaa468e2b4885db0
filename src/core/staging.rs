//! Filtered staging copies of content folders, tracked per workshop item until cleanup.
//!
//! The lifecycle of one item is:
//!
//! 1. [`StagingManager::enter`] copies the included files of the item's content folder into a
//!    fresh temporary directory and returns a [`SubmitContext`] for the submission scope.
//! 2. While the scope runs, whoever resolves the item's content folder asks
//!    [`StagingManager::resolve_content_folder`] (or `current_staged_content_folder`) with that
//!    context and gets the staged copy.
//! 3. [`StagingManager::exit`] ends the scope. The staged copy stays on disk, since an upload may
//!    still be reading it.
//! 4. [`StagingManager::cleanup_all`] deletes every staged copy once uploads are done. Not
//!    calling it leaks the temporary directories.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local};
use serde::Serialize;

use super::error::CoreError;
use super::filter::ContentFilter;
use super::scanner::{copy_filtered, CopySummary};

/// Name of the content directory inside a staging root.
pub const STAGED_CONTENTS_DIR: &str = "Contents";

/// Prefix of the temporary directories created for staged copies.
pub const DEFAULT_STAGING_PREFIX: &str = "workshop_filtered_";

/// Identifies the scope that produced a staging record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OwnerToken(u64);

/// A staged copy waiting for cleanup.
#[derive(Debug, Clone, Serialize)]
pub struct StagingRecord {
    pub original_content_folder: PathBuf,
    pub staged_content_folder: PathBuf,
    pub owner: OwnerToken,
    pub staged_at: DateTime<Local>,
}

impl StagingRecord {
    /// The temporary directory holding `Contents`; this is what cleanup removes.
    pub fn staging_root(&self) -> Option<&Path> {
        self.staged_content_folder.parent()
    }
}

/// The submission scope of one item, handed out by [`StagingManager::enter`].
///
/// Redirection queries only answer for the context that created the current record, so a
/// scope never observes a copy staged by another one.
#[derive(Debug)]
#[must_use = "the staged folder is only visible through this context"]
pub struct SubmitContext {
    item_id: String,
    owner: OwnerToken,
}

impl SubmitContext {
    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn owner(&self) -> OwnerToken {
        self.owner
    }
}

/// Outcome of [`StagingManager::cleanup_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub removed: usize,
    pub already_gone: usize,
    pub failed: usize,
}

/// Owns every staged copy it creates, from `enter` until `cleanup_all`.
#[derive(Debug)]
pub struct StagingManager {
    filter: Arc<ContentFilter>,
    records: Mutex<HashMap<String, StagingRecord>>,
    next_owner: AtomicU64,
    temp_root: Option<PathBuf>,
    prefix: String,
}

impl StagingManager {
    pub fn new(filter: Arc<ContentFilter>) -> Self {
        Self {
            filter,
            records: Mutex::new(HashMap::new()),
            next_owner: AtomicU64::new(1),
            temp_root: None,
            prefix: DEFAULT_STAGING_PREFIX.to_string(),
        }
    }

    /// Creates staging directories under `dir` instead of the system temp directory.
    pub fn with_temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(dir.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn filter(&self) -> &Arc<ContentFilter> {
        &self.filter
    }

    /// Stages a filtered copy of `source_content_folder` for `item_id`.
    ///
    /// Returns `None` when there is no identifier or the copy fails; the caller then keeps using
    /// the original folder. A previous copy staged for the same item is deleted and replaced.
    pub fn enter(
        &self,
        item_id: Option<&str>,
        source_content_folder: &Path,
    ) -> Option<SubmitContext> {
        let item_id = match item_id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => {
                tracing::error!(
                    "{}, cannot track {:?} for cleanup",
                    CoreError::MissingIdentifier,
                    source_content_folder
                );
                return None;
            }
        };

        tracing::info!(
            "Staging item {} from original content folder {:?}",
            item_id,
            source_content_folder
        );

        let (staged, summary) = match self.create_filtered_copy(source_content_folder) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    "Failed to create filtered copy for item {}, using original folder: {}",
                    item_id,
                    e
                );
                return None;
            }
        };

        let owner = OwnerToken(self.next_owner.fetch_add(1, Ordering::Relaxed));
        let record = StagingRecord {
            original_content_folder: source_content_folder.to_path_buf(),
            staged_content_folder: staged.clone(),
            owner,
            staged_at: Local::now(),
        };

        let superseded = self.lock().insert(item_id.to_string(), record);
        if let Some(old) = superseded {
            tracing::warn!(
                "Item {} was already staged at {:?}, removing the superseded copy",
                item_id,
                old.staged_content_folder
            );
            if let Err(e) = remove_staging_root(&old) {
                tracing::error!("Failed to remove superseded copy for item {}: {}", item_id, e);
            }
        }

        tracing::info!(
            "Using filtered folder {:?} for item {} ({} file(s), {} skipped); it stays until cleanup",
            staged,
            item_id,
            summary.files_copied,
            summary.files_skipped
        );

        Some(SubmitContext {
            item_id: item_id.to_string(),
            owner,
        })
    }

    /// The staged `Contents` folder for `item_id`, if `context` is the scope that staged it.
    pub fn current_staged_content_folder(
        &self,
        item_id: &str,
        context: Option<&SubmitContext>,
    ) -> Option<PathBuf> {
        let context = context?;
        if context.item_id != item_id {
            return None;
        }

        self.lock()
            .get(item_id)
            .filter(|record| record.owner == context.owner)
            .map(|record| record.staged_content_folder.clone())
    }

    /// The folder a host should read `item_id`'s content from: the staged copy inside the
    /// owning scope, the original everywhere else.
    pub fn resolve_content_folder(
        &self,
        item_id: &str,
        context: Option<&SubmitContext>,
        original: &Path,
    ) -> PathBuf {
        self.current_staged_content_folder(item_id, context)
            .unwrap_or_else(|| original.to_path_buf())
    }

    /// Ends a submission scope. The staged copy stays until [`cleanup_all`](Self::cleanup_all).
    pub fn exit(&self, context: SubmitContext) {
        tracing::debug!("Leaving submission scope for item {}", context.item_id);
    }

    /// Deletes every staged copy and forgets all records.
    ///
    /// Each item is handled independently; a failed delete is logged and its record is dropped
    /// anyway.
    pub fn cleanup_all(&self) -> CleanupSummary {
        let mut pending: Vec<(String, StagingRecord)> =
            std::mem::take(&mut *self.lock()).into_iter().collect();
        let mut summary = CleanupSummary::default();
        if pending.is_empty() {
            return summary;
        }
        pending.sort_by(|a, b| a.0.cmp(&b.0));

        for (item_id, record) in pending {
            let Some(root) = record.staging_root() else {
                summary.already_gone += 1;
                continue;
            };
            if !root.exists() {
                tracing::debug!("Staged folder for item {} is already gone: {:?}", item_id, root);
                summary.already_gone += 1;
                continue;
            }

            match remove_staging_root(&record) {
                Ok(()) => {
                    tracing::info!("Cleaned up filtered folder for item {}: {:?}", item_id, root);
                    summary.removed += 1;
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to clean up filtered folder for item {}: {}",
                        item_id,
                        e
                    );
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            "Cleaned up all pending filtered folders ({} removed, {} failed)",
            summary.removed,
            summary.failed
        );
        summary
    }

    /// Identifiers with a staged copy awaiting cleanup, sorted.
    pub fn pending(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// A copy of the record for `item_id`, if one is pending.
    pub fn record(&self, item_id: &str) -> Option<StagingRecord> {
        self.lock().get(item_id).cloned()
    }

    /// Copies into `<temp>/<prefix>XXXX/Contents` and returns that `Contents` path.
    ///
    /// The temporary directory is removed again if anything fails before it is handed out.
    fn create_filtered_copy(&self, source: &Path) -> Result<(PathBuf, CopySummary), CoreError> {
        if !source.is_dir() {
            return Err(CoreError::NotADirectory(source.to_path_buf()));
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix(&self.prefix);
        let temp = match &self.temp_root {
            Some(dir) => builder.tempdir_in(dir).map_err(CoreError::io(dir))?,
            None => builder
                .tempdir()
                .map_err(CoreError::io(std::env::temp_dir()))?,
        };

        let contents = temp.path().join(STAGED_CONTENTS_DIR);
        fs::create_dir_all(&contents).map_err(CoreError::io(&contents))?;
        tracing::debug!("Creating filtered copy in {:?}", contents);

        let summary = copy_filtered(&self.filter, source, &contents)?;

        let root = temp.keep();
        Ok((root.join(STAGED_CONTENTS_DIR), summary))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StagingRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn remove_staging_root(record: &StagingRecord) -> Result<(), CoreError> {
    match record.staging_root() {
        Some(root) if root.exists() => fs::remove_dir_all(root).map_err(CoreError::io(root)),
        _ => Ok(()),
    }
}
