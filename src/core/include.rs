//! `@include("path")` expansion for item descriptions.
//!
//! A line whose trimmed text is exactly `@include("some/file.txt")` is replaced by the contents
//! of that file, looked up under a root directory. Paths that are absolute or climb out of the
//! root with `..` are left alone, as are files that cannot be read.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::utils::path::escapes_base;

fn include_directive() -> &'static Regex {
    static DIRECTIVE: OnceLock<Regex> = OnceLock::new();
    DIRECTIVE.get_or_init(|| {
        Regex::new(r#"^@include\("([^"]*)"\)$"#).expect("include directive regex is valid")
    })
}

/// Expands every include directive in `text`, resolving paths under `lookup_root`.
///
/// Lines are split on `\n` (dropping a `\r` in front of it) and joined back with `\n`. No
/// newline is added after the last line.
pub fn expand_includes(text: &str, lookup_root: &Path) -> String {
    if text.is_empty() {
        return String::new();
    }

    text.split('\n')
        .map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            match included_path(line) {
                Some(rel) => read_include(lookup_root, rel).unwrap_or_else(|| line.to_string()),
                None => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The path named by an include directive, if `line` is one.
fn included_path(line: &str) -> Option<&str> {
    include_directive()
        .captures(line.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|rel| !rel.is_empty())
}

fn read_include(lookup_root: &Path, rel: &str) -> Option<String> {
    if escapes_base(rel) {
        tracing::warn!("Refusing to include {:?}: path leaves the item folder", rel);
        return None;
    }

    let path = lookup_root.join(rel);
    if !path.is_file() {
        tracing::warn!("Include file not found: {}", rel);
        return None;
    }

    match fs::read(&path) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::warn!("Include file {} is not valid UTF-8: {}", rel, e);
                None
            }
        },
        Err(e) => {
            tracing::error!("Failed to read include file {}: {}", rel, e);
            None
        }
    }
}
