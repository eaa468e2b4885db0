pub mod settings;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::filter::default_patterns_as_text;
use crate::core::ignore::{IgnoreFileCache, IGNORE_FILE_NAME};
use crate::core::staging::DEFAULT_STAGING_PREFIX;
use crate::core::{ContentFilter, StagingManager};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    /// Global exclusion patterns, `;`-separated. Blank selects the built-in defaults.
    pub excluded_patterns: String,
    /// Name of the per-directory ignore file.
    pub ignore_file_name: String,
    /// Prefix for staging directories.
    pub staging_prefix: String,
    /// Where staging directories are created; the system temp directory when unset.
    pub staging_directory: Option<PathBuf>,
}

impl FilterConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        settings::load_config(config_path)
    }

    /// Builds a filter with this configuration's patterns and ignore-file name.
    pub fn build_filter(&self) -> ContentFilter {
        let filter =
            ContentFilter::with_ignore_cache(IgnoreFileCache::with_file_name(&self.ignore_file_name));
        filter.load_patterns(&self.excluded_patterns);
        filter
    }

    /// Builds a staging manager around `filter` using this configuration's staging settings.
    pub fn build_staging_manager(&self, filter: Arc<ContentFilter>) -> StagingManager {
        let manager = StagingManager::new(filter).with_prefix(&self.staging_prefix);
        match &self.staging_directory {
            Some(dir) => manager.with_temp_root(dir),
            None => manager,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            excluded_patterns: default_patterns_as_text(),
            ignore_file_name: IGNORE_FILE_NAME.to_string(),
            staging_prefix: DEFAULT_STAGING_PREFIX.to_string(),
            staging_directory: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DEFAULT_PATTERNS;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_builds_default_filter() {
        let filter = FilterConfig::default().build_filter();
        assert_eq!(filter.excluded_patterns().len(), DEFAULT_PATTERNS.len());
        assert_eq!(filter.ignore_cache().file_name(), IGNORE_FILE_NAME);
    }

    #[test]
    fn test_build_filter_uses_configured_ignore_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".publishignore"), "drafts\n").unwrap();
        fs::create_dir_all(temp.path().join("drafts")).unwrap();
        fs::write(temp.path().join("drafts/wip.txt"), "x").unwrap();

        let config = FilterConfig {
            excluded_patterns: "*.bak".to_string(),
            ignore_file_name: ".publishignore".to_string(),
            ..Default::default()
        };
        let filter = config.build_filter();
        assert_eq!(filter.excluded_patterns(), vec!["*.bak"]);
        assert!(!filter.should_include("drafts/wip.txt", Some(temp.path())));
    }

    #[test]
    fn test_build_staging_manager_uses_configured_directory() {
        let source = TempDir::new().unwrap();
        fs::write(source.path().join("a.txt"), "a").unwrap();
        let staging = TempDir::new().unwrap();

        let config = FilterConfig {
            staging_prefix: "upload_".to_string(),
            staging_directory: Some(staging.path().to_path_buf()),
            ..Default::default()
        };
        let manager = config.build_staging_manager(Arc::new(config.build_filter()));
        let ctx = manager.enter(Some("42"), source.path()).unwrap();
        let staged = manager.current_staged_content_folder("42", Some(&ctx)).unwrap();

        let root_name = staged.parent().unwrap().file_name().unwrap().to_string_lossy();
        assert!(root_name.starts_with("upload_"));
        assert!(staged.starts_with(staging.path()));
        manager.cleanup_all();
    }
}
