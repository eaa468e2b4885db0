//! Defines the custom error type for the `core` module.

use std::path::{PathBuf, StripPrefixError};
use thiserror::Error;

/// The primary error type for the `core` module.
///
/// Most public entry points in `core` degrade instead of failing (an unreadable ignore file
/// means "no patterns", a failed staging means "use the original folder"). `CoreError` is what
/// the lower layers return before that decision is made.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Represents an I/O error, typically from file system operations.
    #[error("I/O error for path {1}: {0}")]
    Io(#[source] std::io::Error, PathBuf),

    /// Represents an error that occurred when a Tokio blocking task was joined.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Represents a path that was expected to be a directory but was not.
    #[error("Path is not a valid directory: {0}")]
    NotADirectory(PathBuf),

    /// Represents a failure to strip a path prefix.
    #[error("Failed to strip prefix from path: {0}")]
    PathStrip(#[from] StripPrefixError),

    /// A staging request arrived without an item identifier.
    #[error("Workshop item has no identifier")]
    MissingIdentifier,
}

impl CoreError {
    /// Shorthand for wrapping an `io::Error` together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |e| CoreError::Io(e, path)
    }
}
