//! Path normalization and exclusion matching shared by export and extract.

use crate::error::{FencepackError, Result};
use std::ffi::OsStr;
use std::path::{Component, MAIN_SEPARATOR, MAIN_SEPARATOR_STR, Path, PathBuf};

/// Rewrites both `/` and `\` to the platform separator.
pub fn normalize_separators(path: &str) -> String {
    path.chars()
        .map(|c| if c == '/' || c == '\\' { MAIN_SEPARATOR } else { c })
        .collect()
}

/// Separator-normalized form with empty and `.` segments dropped.
///
/// `./app//Models/` and `/app/Models` both become `app/Models`.
fn lexical_form(path: &str) -> String {
    normalize_separators(path)
        .split(MAIN_SEPARATOR)
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join(MAIN_SEPARATOR_STR)
}

/// A path prefix that suppresses the path itself and everything nested under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionRule {
    prefix: String,
}

impl ExclusionRule {
    /// Builds a rule from user input written with either separator style.
    /// `app/Models/`, `./app/Models` and `app\Models` are the same rule.
    pub fn new(rule: &str) -> Self {
        Self {
            prefix: lexical_form(rule),
        }
    }

    /// The normalized prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// True if `path` equals the rule or lies underneath it.
    ///
    /// Matching is on whole segments: `app/Models` does not cover `app/ModelsOld`.
    pub fn matches(&self, path: &Path) -> bool {
        if self.prefix.is_empty() {
            return false;
        }
        let path = lexical_form(&path.to_string_lossy());
        path == self.prefix
            || path
                .strip_prefix(self.prefix.as_str())
                .is_some_and(|rest| rest.starts_with(MAIN_SEPARATOR))
    }
}

/// Ordered set of exclusion rules. A path is excluded if any rule matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionRules {
    rules: Vec<ExclusionRule>,
}

impl ExclusionRules {
    pub fn new<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            rules: rules
                .into_iter()
                .map(|r| ExclusionRule::new(r.as_ref()))
                .collect(),
        }
    }

    /// First rule covering `path`
    pub fn matching(&self, path: &Path) -> Option<&ExclusionRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        self.matching(path).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

/// Canonicalizes a base directory and checks that it is one.
///
/// # Errors
///
/// `FencepackError::InvalidPath` if the path does not exist or is not a directory.
pub fn resolve_base_dir(path: &Path) -> Result<PathBuf> {
    let invalid = || FencepackError::InvalidPath {
        path: path.to_path_buf(),
    };
    let canonical = path.canonicalize().map_err(|_| invalid())?;
    if !canonical.is_dir() {
        return Err(invalid());
    }
    Ok(canonical)
}

/// First segment of a path relative to the base directory.
pub fn top_level_segment(relative: &Path) -> Option<&OsStr> {
    match relative.components().next() {
        Some(Component::Normal(segment)) => Some(segment),
        _ => None,
    }
}

/// Turns a block header path into a relative path that stays inside the target directory.
///
/// Leading separators and `.` segments are dropped (`/app/a.php` and `./app/a.php`
/// both land at `app/a.php`).
///
/// # Errors
///
/// `FencepackError::PathTraversal` for `..` segments, drive prefixes, or a path that
/// names the target directory itself.
pub fn contained_relative_path(raw: &str) -> Result<PathBuf> {
    let normalized = normalize_separators(raw);
    let mut relative = PathBuf::new();
    for component in Path::new(normalized.trim_start_matches(MAIN_SEPARATOR)).components() {
        match component {
            Component::Normal(segment) => relative.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(FencepackError::PathTraversal {
                    path: raw.to_string(),
                });
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(FencepackError::PathTraversal {
            path: raw.to_string(),
        });
    }

    Ok(relative)
}
