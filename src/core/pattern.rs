//! Wildcard exclusion patterns.
//!
//! A pattern is a plain string in which `*` stands for "any run of characters". Everything else
//! is literal and case-sensitive. A pattern excludes an entry when it matches the entry's file
//! name, its whole relative path, or any single segment of that path:
//!
//! - `*.log` excludes `debug.log` and `logs/today/debug.log`
//! - `.git` excludes `.git/config` and `vendor/.git/HEAD`
//! - `sub/d.txt` excludes exactly that relative path
//!
//! Unlike gitignore there is no negation, no `**`, and no anchoring.

use regex::Regex;

use crate::utils::path::{file_name_of, to_slash};

/// A pattern compiled once and reusable across many lookups.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    raw: String,
    has_wildcard: bool,
    /// `None` when the regex could not be built; matching then falls back to substrings.
    regex: Option<Regex>,
}

impl CompiledPattern {
    pub fn new(pattern: &str) -> Self {
        let regex = if pattern.is_empty() {
            None
        } else {
            match Regex::new(&pattern_to_regex(pattern)) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::warn!(
                        "Pattern '{}' could not be compiled ({}), using substring matching",
                        pattern,
                        e
                    );
                    None
                }
            }
        };

        Self {
            raw: pattern.to_string(),
            has_wildcard: pattern.contains('*'),
            regex,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Tests a `/`-separated relative path and its bare file name against this pattern.
    pub fn matches(&self, relative_path: &str, file_name: &str) -> bool {
        if self.raw.is_empty() {
            return false;
        }

        let Some(regex) = &self.regex else {
            return relative_path.contains(&self.raw) || file_name.contains(&self.raw);
        };

        if regex.is_match(file_name) || regex.is_match(relative_path) {
            return true;
        }

        if self.has_wildcard {
            relative_path.split('/').any(|segment| regex.is_match(segment))
        } else {
            let pattern = self.raw.as_str();
            relative_path.contains(&format!("/{pattern}/"))
                || relative_path.ends_with(&format!("/{pattern}"))
                || relative_path.starts_with(&format!("{pattern}/"))
        }
    }
}

/// Compiles `pattern` and tests it in one go.
///
/// Prefer [`CompiledPattern`] when the same pattern is applied to many paths.
pub fn matches(relative_path: &str, file_name: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    let normalized = to_slash(relative_path);
    let file_name = if file_name.is_empty() {
        file_name_of(&normalized)
    } else {
        file_name
    };
    CompiledPattern::new(pattern).matches(&normalized, file_name)
}

/// Builds an anchored regex in which `*` means `.*` and every other character is literal.
fn pattern_to_regex(pattern: &str) -> String {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("^(?:{body})$")
}
