//! End-to-end tests for listing, copying, staging and include expansion.
//!
//! Each test builds its own content folder in a temporary directory and its own
//! `ContentFilter`, so tests never share pattern or cache state.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use workshop_filter::core::{
    copy_filtered, expand_includes, list_filtered_relative_paths, ContentFilter, StagingManager,
    IGNORE_FILE_NAME,
};
use workshop_filter::utils::test_helpers::{setup_test_logging, write_tree};

/// Contains the test infrastructure.
mod helpers {
    use super::*;

    /// A content folder in a temporary directory.
    pub struct Project {
        pub root: PathBuf,
        _temp_dir: TempDir,
    }

    impl Project {
        pub fn new(files: &[(&str, &str)]) -> Self {
            setup_test_logging();
            let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
            let project = Self {
                root: temp_dir.path().to_path_buf(),
                _temp_dir: temp_dir,
            };
            write_tree(&project.root, files);
            project
        }

        pub fn create_file(&self, path: &str, content: &str) {
            write_tree(&self.root, &[(path, content)]);
        }

        /// A typical mod folder with some junk that should never be published.
        pub fn mod_folder() -> Self {
            Self::new(&[
                ("mod.info", "name=Better Upload"),
                ("poster.png", "png"),
                ("media/lua/client/main.lua", "print('hi')"),
                ("media/lua/client/main.lua.swp", "swap"),
                ("media/textures/.DS_Store", "junk"),
                (".git/HEAD", "ref: refs/heads/main"),
                (".gitignore", "*.log"),
                (".vscode/settings.json", "{}"),
                ("build.log", "log"),
                ("tmp/scratch.txt", "scratch"),
            ])
        }
    }

    /// Maps every file below `root` to its content, keyed by `/`-separated relative path.
    pub fn snapshot_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
        walk(root, root)
    }

    fn walk(root: &Path, dir: &Path) -> BTreeMap<String, Vec<u8>> {
        let mut files = BTreeMap::new();
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                files.extend(walk(root, &path));
            } else {
                let rel = path
                    .strip_prefix(root)
                    .unwrap()
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                files.insert(rel, fs::read(&path).unwrap());
            }
        }
        files
    }
}

use helpers::{snapshot_tree, Project};

#[test]
fn test_default_patterns_filter_listing() {
    // --- ARRANGE ---
    let project = Project::new(&[
        ("a.txt", "a"),
        ("b.log", "b"),
        (".git/config", "c"),
        ("sub/c.tmp", "c"),
        ("sub/d.txt", "d"),
    ]);
    let filter = ContentFilter::new();

    // --- ACT ---
    let listing = list_filtered_relative_paths(&filter, &project.root);

    // --- ASSERT ---
    assert_eq!(listing, vec!["a.txt", "sub/d.txt"]);
}

#[test]
fn test_root_ignore_file_excludes_directory() {
    let project = Project::new(&[(IGNORE_FILE_NAME, "sub\n"), ("a.txt", "a"), ("sub/d.txt", "d")]);
    // The ignore file itself would otherwise be published, so exclude it like a user would.
    let filter = ContentFilter::with_patterns(IGNORE_FILE_NAME);

    assert_eq!(list_filtered_relative_paths(&filter, &project.root), vec!["a.txt"]);
}

#[test]
fn test_nested_ignore_files_combine_with_globals() {
    let project = Project::mod_folder();
    project.create_file(&format!("media/{IGNORE_FILE_NAME}"), "# sources\n*.psd\n");
    project.create_file("media/textures/icon.psd", "psd");
    project.create_file("media/textures/icon.png", "png");
    project.create_file(IGNORE_FILE_NAME, "poster.png\n");
    let filter = ContentFilter::new();

    let listing = list_filtered_relative_paths(&filter, &project.root);

    insta::assert_snapshot!(listing.join("\n"), @r"
    .workshopignore
    media/.workshopignore
    media/lua/client/main.lua
    media/textures/icon.png
    mod.info
    ");
}

#[test]
fn test_copy_contains_exactly_the_listed_files() {
    let project = Project::mod_folder();
    let destination = tempfile::tempdir().unwrap();
    let filter = ContentFilter::new();

    let summary = copy_filtered(&filter, &project.root, destination.path()).unwrap();

    let source_tree = snapshot_tree(&project.root);
    let copied_tree = snapshot_tree(destination.path());
    let listed = list_filtered_relative_paths(&filter, &project.root);

    assert_eq!(copied_tree.keys().cloned().collect::<Vec<_>>(), listed);
    for (rel, bytes) in &copied_tree {
        assert_eq!(Some(bytes), source_tree.get(rel), "content differs for {rel}");
    }
    assert_eq!(summary.files_copied, listed.len());
    assert_eq!(summary.files_copied + summary.files_skipped, source_tree.len());
    // Excluded directories still exist, empty.
    assert!(destination.path().join(".git").is_dir());
    assert!(destination.path().join("tmp").is_dir());
}

#[test]
fn test_staging_round_trip() {
    let project = Project::mod_folder();
    let filter = Arc::new(ContentFilter::new());
    let manager = StagingManager::new(Arc::clone(&filter));

    let context = manager
        .enter(Some("2981234567"), &project.root)
        .expect("staging should succeed");
    let staged = manager
        .current_staged_content_folder("2981234567", Some(&context))
        .unwrap();
    let staging_root = staged.parent().unwrap().to_path_buf();

    assert_eq!(
        snapshot_tree(&staged).keys().cloned().collect::<Vec<_>>(),
        list_filtered_relative_paths(&filter, &project.root)
    );
    assert!(project.root.join("build.log").exists(), "source is never modified");

    manager.exit(context);
    assert!(staged.is_dir());

    let first = manager.cleanup_all();
    assert_eq!(first.removed, 1);
    assert!(!staging_root.exists());

    let second = manager.cleanup_all();
    assert_eq!(second.removed + second.failed + second.already_gone, 0);
}

#[test]
fn test_concurrent_staging_scopes_are_isolated() {
    let project = Arc::new(Project::mod_folder());
    let manager = Arc::new(StagingManager::new(Arc::new(ContentFilter::new())));

    let handles: Vec<_> = ["alpha", "beta", "gamma", "delta"]
        .into_iter()
        .map(|item_id| {
            let manager = Arc::clone(&manager);
            let project = Arc::clone(&project);
            std::thread::spawn(move || {
                let context = manager.enter(Some(item_id), &project.root).unwrap();
                let own = manager
                    .current_staged_content_folder(item_id, Some(&context))
                    .unwrap();
                for other in ["alpha", "beta", "gamma", "delta"] {
                    if other != item_id {
                        assert!(manager
                            .current_staged_content_folder(other, Some(&context))
                            .is_none());
                    }
                }
                manager.exit(context);
                own
            })
        })
        .collect();

    let folders: Vec<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for (i, a) in folders.iter().enumerate() {
        for b in &folders[i + 1..] {
            assert_ne!(a, b);
        }
    }
    assert_eq!(manager.pending(), vec!["alpha", "beta", "delta", "gamma"]);

    assert_eq!(manager.cleanup_all().removed, 4);
    assert!(folders.iter().all(|f| !f.exists()));
}

#[test]
fn test_include_expansion_scenario() {
    let project = Project::new(&[("sub/d.txt", "X\nY")]);

    assert_eq!(
        expand_includes("Before\n@include(\"sub/d.txt\")\nAfter", &project.root),
        "Before\nX\nY\nAfter"
    );
    let traversal = "@include(\"../secret\")";
    assert_eq!(expand_includes(traversal, &project.root), traversal);
}
