//! Path helpers shared by the matcher and the tree filter.
//!
//! All pattern matching happens on `/`-separated strings so that a pattern written on one
//! platform behaves the same on another.

use std::borrow::Cow;
use std::path::{Component, Path, StripPrefixError};

/// Rewrites every `\` in `path` to `/`. Borrows when there is nothing to rewrite.
pub fn to_slash(path: &str) -> Cow<'_, str> {
    if path.contains('\\') {
        Cow::Owned(path.replace('\\', "/"))
    } else {
        Cow::Borrowed(path)
    }
}

/// Returns the final component of a `/`-separated path, ignoring trailing separators.
pub fn file_name_of(normalized: &str) -> &str {
    let trimmed = normalized.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Expresses `path` relative to `root` with `/` separators.
pub fn relative_slash_path(root: &Path, path: &Path) -> Result<String, StripPrefixError> {
    let relative = path.strip_prefix(root)?;
    let parts: Vec<Cow<'_, str>> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();
    Ok(parts.join("/"))
}

/// True if `path` would escape its base: it is absolute, rooted, or has a `..` segment.
pub fn escapes_base(path: &str) -> bool {
    let candidate = Path::new(path);
    candidate.is_absolute()
        || candidate.has_root()
        || to_slash(path).split('/').any(|segment| segment == "..")
}
