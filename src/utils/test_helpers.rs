//! Shared fixtures for unit and integration tests.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static SUBSCRIBER: OnceLock<()> = OnceLock::new();

/// Routes `tracing` output through the test harness so it only shows for failing tests.
///
/// `RUST_LOG` wins when set; otherwise this crate logs at `debug` and everything else is
/// silent. Any subscriber installed earlier (for example by `#[traced_test]`) is kept.
pub fn setup_test_logging() {
    SUBSCRIBER.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("workshop_filter=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Writes `files` (relative path, content) below `root`, creating parent directories.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&path, content).expect("Failed to write fixture file");
    }
}

/// Permission-based failures cannot be provoked as root, so such tests bail out early.
#[cfg(test)]
pub fn running_as_root() -> bool {
    #[cfg(unix)]
    {
        // SAFETY: geteuid only reads the effective uid of the calling process.
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}
