pub mod error;
pub mod filter;
pub mod ignore;
pub mod include;
pub mod pattern;
pub mod scanner;
pub mod staging;

pub use error::CoreError;
pub use filter::{default_patterns_as_text, parse_patterns, ContentFilter, DEFAULT_PATTERNS};
pub use ignore::{IgnoreFileCache, IGNORE_FILE_NAME};
pub use include::expand_includes;
pub use pattern::{matches, CompiledPattern};
pub use scanner::{
    copy_filtered, list_filtered_relative_paths, list_filtered_relative_paths_async, CopySummary,
};
pub use staging::{
    CleanupSummary, OwnerToken, StagingManager, StagingRecord, SubmitContext, STAGED_CONTENTS_DIR,
};
