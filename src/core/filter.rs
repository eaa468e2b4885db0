//! The inclusion decision: global exclusion patterns plus per-directory ignore files.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use super::ignore::IgnoreFileCache;
use super::pattern::CompiledPattern;
use crate::utils::path::{file_name_of, to_slash};

/// Patterns used when no configuration was ever loaded, or when the loaded text is blank.
pub const DEFAULT_PATTERNS: &[&str] = &[
    ".DS_Store",
    ".git*",
    ".gradle",
    ".idea",
    ".vscode",
    "*.log",
    "*.tmp",
    "*.swp",
    "Thumbs.db",
    "tmp",
];

/// Separator between patterns in configuration text.
pub const PATTERN_SEPARATOR: char = ';';

/// The default patterns rendered as configuration text (`".DS_Store; .git*; ..."`).
pub fn default_patterns_as_text() -> String {
    DEFAULT_PATTERNS.join("; ")
}

/// Splits configuration text into patterns. Blank text selects [`DEFAULT_PATTERNS`].
///
/// Entries are trimmed, empty entries dropped, and duplicates removed keeping the first.
pub fn parse_patterns(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect();
    }

    let mut patterns: Vec<String> = Vec::new();
    for pattern in text.split(PATTERN_SEPARATOR).map(str::trim) {
        if !pattern.is_empty() && !patterns.iter().any(|p| p == pattern) {
            patterns.push(pattern.to_string());
        }
    }
    patterns
}

/// Decides which files of a content folder get published.
///
/// Holds the global pattern set and the ignore-file cache. One instance is meant to be shared
/// (behind an `Arc`) by every listing, copy and staging operation of a process.
#[derive(Debug, Default)]
pub struct ContentFilter {
    /// `None` until patterns are loaded; the first lookup then installs the defaults.
    patterns: RwLock<Option<Arc<Vec<CompiledPattern>>>>,
    ignore_cache: IgnoreFileCache,
}

impl ContentFilter {
    /// A filter that falls back to [`DEFAULT_PATTERNS`] on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// A filter with patterns loaded from `;`-separated text.
    pub fn with_patterns(text: &str) -> Self {
        let filter = Self::new();
        filter.load_patterns(text);
        filter
    }

    /// A filter reading ignore files through the given cache.
    pub fn with_ignore_cache(ignore_cache: IgnoreFileCache) -> Self {
        Self {
            patterns: RwLock::new(None),
            ignore_cache,
        }
    }

    /// Replaces the global pattern set. Blank text restores the defaults.
    pub fn load_patterns(&self, text: &str) {
        let compiled: Vec<CompiledPattern> = parse_patterns(text)
            .iter()
            .map(|p| CompiledPattern::new(p))
            .collect();
        tracing::info!("Loaded {} exclusion pattern(s)", compiled.len());

        let mut guard = self
            .patterns
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(Arc::new(compiled));
    }

    /// A snapshot of the current global patterns.
    pub fn excluded_patterns(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|p| p.as_str().to_string())
            .collect()
    }

    pub fn ignore_cache(&self) -> &IgnoreFileCache {
        &self.ignore_cache
    }

    /// Forgets every cached ignore file.
    pub fn clear_cache(&self) {
        self.ignore_cache.clear_cache();
    }

    /// Returns `true` if `relative_path` should be published.
    ///
    /// `base_path` is the content root `relative_path` is relative to; it is used to locate
    /// the ignore files that apply. Without it the path is resolved against the process's
    /// working directory. An empty path is never included.
    pub fn should_include(&self, relative_path: &str, base_path: Option<&Path>) -> bool {
        if relative_path.is_empty() {
            return false;
        }

        let normalized = to_slash(relative_path);
        let file_name = file_name_of(&normalized);

        if let Some(pattern) = self
            .snapshot()
            .iter()
            .find(|p| p.matches(&normalized, file_name))
        {
            tracing::trace!("{} excluded by pattern '{}'", normalized, pattern.as_str());
            return false;
        }

        if let Some(dir) = containing_directory(&normalized, base_path) {
            if let Some(pattern) = self
                .ignore_cache
                .compiled_patterns_for(&dir)
                .iter()
                .find(|p| p.matches(&normalized, file_name))
            {
                tracing::trace!(
                    "{} excluded by {} pattern '{}'",
                    normalized,
                    self.ignore_cache.file_name(),
                    pattern.as_str()
                );
                return false;
            }
        }

        true
    }

    /// Keeps the included subset of `paths`, in order.
    pub fn filter_file_paths<S: AsRef<str>>(
        &self,
        paths: &[S],
        base_path: Option<&Path>,
    ) -> Vec<String> {
        paths
            .iter()
            .filter_map(|path| {
                let path: &str = path.as_ref();
                self.should_include(path, base_path)
                    .then(|| path.to_string())
            })
            .collect()
    }

    fn snapshot(&self) -> Arc<Vec<CompiledPattern>> {
        {
            let guard = self
                .patterns
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(patterns) = guard.as_ref() {
                return Arc::clone(patterns);
            }
        }

        let mut guard = self
            .patterns
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let patterns = guard.get_or_insert_with(|| {
            tracing::debug!("No exclusion patterns configured, using defaults");
            Arc::new(
                DEFAULT_PATTERNS
                    .iter()
                    .map(|p| CompiledPattern::new(p))
                    .collect(),
            )
        });
        Arc::clone(patterns)
    }
}

/// The directory whose ignore files govern `relative_path`: the entry itself if it is a
/// directory, otherwise its parent.
fn containing_directory(relative_path: &str, base_path: Option<&Path>) -> Option<PathBuf> {
    let absolute = match base_path {
        Some(base) if !base.as_os_str().is_empty() => base.join(relative_path),
        _ => PathBuf::from(relative_path),
    };

    if absolute.is_dir() {
        return Some(absolute);
    }
    absolute
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
}
