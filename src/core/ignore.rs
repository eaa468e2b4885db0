//! Per-directory `.workshopignore` files and their cache.
//!
//! An ignore file lists one pattern per line. Blank lines and lines starting with `#` are
//! skipped. Patterns declared in a directory apply to every entry below it, so a lookup walks
//! from the entry's directory up to the filesystem root and collects each level's patterns,
//! deepest first.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::pattern::CompiledPattern;

/// Name of the per-directory ignore file.
pub const IGNORE_FILE_NAME: &str = ".workshopignore";

type CachedPatterns = Arc<Vec<CompiledPattern>>;

/// Caches the parsed ignore file of every directory visited so far, keyed by canonical path.
///
/// Entries are created lazily and kept until [`IgnoreFileCache::clear_cache`]. Directories
/// without an ignore file are cached too, as an empty list.
#[derive(Debug)]
pub struct IgnoreFileCache {
    file_name: String,
    entries: Mutex<HashMap<PathBuf, CachedPatterns>>,
}

impl Default for IgnoreFileCache {
    fn default() -> Self {
        Self::new()
    }
}

impl IgnoreFileCache {
    pub fn new() -> Self {
        Self::with_file_name(IGNORE_FILE_NAME)
    }

    /// A cache that reads `file_name` instead of `.workshopignore` in each directory.
    pub fn with_file_name(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// All patterns that apply inside `directory`, deepest directory first.
    pub fn patterns_for(&self, directory: &Path) -> Vec<String> {
        self.compiled_patterns_for(directory)
            .iter()
            .map(|p| p.as_str().to_string())
            .collect()
    }

    /// Same as [`patterns_for`](Self::patterns_for), but already compiled for matching.
    pub fn compiled_patterns_for(&self, directory: &Path) -> Vec<CompiledPattern> {
        let start = match fs::canonicalize(directory) {
            Ok(canonical) => canonical,
            Err(e) => {
                tracing::debug!(
                    "Could not resolve {:?} ({}), checking only its own ignore file",
                    directory,
                    e
                );
                return self.read_ignore_file(directory);
            }
        };

        let mut collected = Vec::new();
        let mut current = Some(start.as_path());

        while let Some(dir) = current {
            collected.extend(self.cached_or_read(dir).iter().cloned());

            current = match dir.parent() {
                Some(parent) if parent != dir => Some(parent),
                _ => None,
            };
        }

        collected
    }

    /// Drops every cached entry. Call this when ignore files may have changed on disk.
    pub fn clear_cache(&self) {
        let mut entries = self.lock();
        let dropped = entries.len();
        entries.clear();
        tracing::debug!("Cleared {} cached ignore entries", dropped);
    }

    /// Number of directories currently cached.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn cached_or_read(&self, dir: &Path) -> CachedPatterns {
        if let Some(cached) = self.lock().get(dir) {
            return Arc::clone(cached);
        }

        // Read outside the lock; a concurrent reader of the same directory produces the same
        // list, and whichever insert lands first is kept.
        let patterns = Arc::new(self.read_ignore_file(dir));
        Arc::clone(
            self.lock()
                .entry(dir.to_path_buf())
                .or_insert(patterns),
        )
    }

    fn read_ignore_file(&self, dir: &Path) -> Vec<CompiledPattern> {
        let ignore_file = dir.join(&self.file_name);
        if !ignore_file.is_file() {
            return Vec::new();
        }

        match fs::read_to_string(&ignore_file) {
            Ok(content) => {
                let patterns = parse_ignore_file(&content);
                tracing::debug!(
                    "Loaded {} pattern(s) from {:?}",
                    patterns.len(),
                    ignore_file
                );
                patterns.iter().map(|p| CompiledPattern::new(p)).collect()
            }
            Err(e) => {
                tracing::warn!("Failed to read ignore file {:?}: {}", ignore_file, e);
                Vec::new()
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, CachedPatterns>> {
        // The map holds no invariants a panicking writer could break.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Parses the content of an ignore file into its patterns, in file order.
pub fn parse_ignore_file(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_helpers::setup_test_logging;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let content = "# build output\n\n  target  \n*.bak\r\n   \n#*.keep\n";
        assert_eq!(parse_ignore_file(content), vec!["target", "*.bak"]);
    }

    #[test]
    fn test_patterns_for_collects_deepest_first() {
        setup_test_logging();
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, IGNORE_FILE_NAME, "root-pattern\n");
        write(root, &format!("a/{IGNORE_FILE_NAME}"), "a-pattern\n");
        write(root, &format!("a/b/{IGNORE_FILE_NAME}"), "b-one\nb-two\n");

        let cache = IgnoreFileCache::new();
        let patterns = cache.patterns_for(&root.join("a/b"));

        // Anything above the temp dir is outside the test's control, so only look at the
        // leading entries.
        assert_eq!(&patterns[..4], &["b-one", "b-two", "a-pattern", "root-pattern"]);
    }

    #[test]
    fn test_sibling_patterns_do_not_leak() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, &format!("left/{IGNORE_FILE_NAME}"), "secret\n");
        fs::create_dir_all(root.join("right")).unwrap();

        let cache = IgnoreFileCache::new();
        assert!(cache.patterns_for(&root.join("left")).contains(&"secret".to_string()));
        assert!(!cache.patterns_for(&root.join("right")).contains(&"secret".to_string()));
    }

    #[test]
    fn test_entries_are_cached_until_cleared() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("content");
        fs::create_dir_all(&dir).unwrap();

        let cache = IgnoreFileCache::new();
        assert!(!cache.patterns_for(&dir).contains(&"late".to_string()));
        assert!(!cache.is_empty());

        write(&dir, IGNORE_FILE_NAME, "late\n");
        assert!(
            !cache.patterns_for(&dir).contains(&"late".to_string()),
            "cached entry should be served until cleared"
        );

        cache.clear_cache();
        assert!(cache.is_empty());
        assert!(cache.patterns_for(&dir).contains(&"late".to_string()));
    }

    #[test]
    fn test_missing_directory_degrades_to_no_patterns() {
        let temp = TempDir::new().unwrap();
        let cache = IgnoreFileCache::new();
        assert!(cache.patterns_for(&temp.path().join("does/not/exist")).is_empty());
        assert!(cache.is_empty(), "unresolvable directories are not cached");
    }

    #[test]
    fn test_custom_file_name() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), ".publishignore", "drafts\n");
        write(temp.path(), IGNORE_FILE_NAME, "other\n");

        let cache = IgnoreFileCache::with_file_name(".publishignore");
        let patterns = cache.patterns_for(temp.path());
        assert!(patterns.contains(&"drafts".to_string()));
        assert!(!patterns.contains(&"other".to_string()));
    }

    #[test]
    fn test_concurrent_lookups_share_one_entry_per_directory() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), &format!("x/{IGNORE_FILE_NAME}"), "*.bak\n");
        let dir = temp.path().join("x");
        let cache = Arc::new(IgnoreFileCache::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let dir = dir.clone();
                std::thread::spawn(move || cache.patterns_for(&dir))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap()[0], "*.bak");
        }
        let canonical = fs::canonicalize(&dir).unwrap();
        assert!(cache.lock().contains_key(&canonical));
    }
}
