//! Safety check before extracting over a working tree.
//!
//! Extraction overwrites files without looking at them first. When the target sits
//! inside a git working tree with uncommitted changes, those changes would be lost,
//! so the operator must confirm before any write happens.

use crate::error::{FencepackError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Marker directory identifying a working tree root
pub const VCS_MARKER: &str = ".git";

/// Runs the version-control status query for a working tree.
pub trait StatusQuery {
    /// Returns `git status --porcelain` style output for the tree at `root`.
    ///
    /// # Errors
    ///
    /// `FencepackError::VersionControlQuery` if the tool is missing or fails.
    fn porcelain_status(&self, root: &Path) -> Result<String>;
}

/// Asks the operator whether to proceed.
pub trait Confirmation {
    /// `Ok(true)` to continue, `Ok(false)` to abort.
    ///
    /// # Errors
    ///
    /// Implementations may fail if the operator cannot be asked at all.
    fn confirm(&self, state: &RepositoryState) -> Result<bool>;
}

/// Status query backed by the `git` executable
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl StatusQuery for GitCli {
    fn porcelain_status(&self, root: &Path) -> Result<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(root)
            .args(["status", "--porcelain"])
            .output()
            .map_err(|e| FencepackError::VersionControlQuery {
                message: format!("failed to run git: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FencepackError::VersionControlQuery {
                message: format!("git status failed ({}): {}", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Repository state of an extraction target, computed fresh on every call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryState {
    /// Working tree root, if the target is inside one
    pub root: Option<PathBuf>,
    /// Status lines with a modified working-tree column
    pub changes: Vec<String>,
}

impl RepositoryState {
    pub fn is_version_controlled(&self) -> bool {
        self.root.is_some()
    }

    pub fn has_uncommitted_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Outcome of the safety check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Not a working tree, or nothing uncommitted
    Clean,
    /// Check bypassed by the caller
    Forced,
    /// Operator agreed to overwrite a dirty working tree
    Confirmed,
    /// Operator refused
    Declined,
}

impl Verdict {
    pub fn may_write(self) -> bool {
        !matches!(self, Self::Declined)
    }
}

/// Walks up from `start` looking for a directory containing the marker.
pub fn find_repository_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(VCS_MARKER).is_dir())
        .map(Path::to_path_buf)
}

/// Lines of porcelain output whose working-tree column (second character) is not blank.
///
/// Lines shorter than `XY ` are ignored.
pub fn unstaged_changes(porcelain: &str) -> Vec<&str> {
    porcelain
        .lines()
        .filter(|line| line.len() >= 3)
        .filter(|line| line.as_bytes()[1] != b' ')
        .collect()
}

/// Computes the repository state of `dir`.
///
/// A failing status query is treated as a clean tree.
pub fn inspect(dir: &Path, query: &dyn StatusQuery) -> RepositoryState {
    let Some(root) = find_repository_root(dir) else {
        debug!("{} is not inside a git working tree", dir.display());
        return RepositoryState::default();
    };

    let changes = match query.porcelain_status(&root) {
        Ok(output) => unstaged_changes(&output)
            .into_iter()
            .map(str::to_string)
            .collect(),
        Err(e) => {
            warn!("{e}; assuming no unstaged changes");
            Vec::new()
        }
    };

    RepositoryState {
        root: Some(root),
        changes,
    }
}

/// Decides whether extraction into `dir` may start.
///
/// # Errors
///
/// Propagates errors from the confirmation boundary.
pub fn check(
    dir: &Path,
    force: bool,
    query: &dyn StatusQuery,
    confirmation: &dyn Confirmation,
) -> Result<Verdict> {
    if force {
        debug!("Skipping git status check");
        return Ok(Verdict::Forced);
    }

    let state = inspect(dir, query);
    if !state.has_uncommitted_changes() {
        return Ok(Verdict::Clean);
    }

    warn!(
        "Unstaged change(s) in {}:\n{}",
        state.root.as_deref().unwrap_or(dir).display(),
        state.changes.join("\n")
    );

    if confirmation.confirm(&state)? {
        Ok(Verdict::Confirmed)
    } else {
        Ok(Verdict::Declined)
    }
}
