use crate::document::{ContentType, FileRecord, render_document};
use crate::error::Result;
use crate::paths::{resolve_base_dir, top_level_segment};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Top-level directories left out of an export unless explicitly included
pub const DEFAULT_EXCLUDED_DIRS: [&str; 5] = ["vendor", "config", "bootstrap", "routes", "public"];

/// Configuration for exporting a tree into a document
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Directory whose files are exported
    pub base_dir: PathBuf,
    /// First path segments (relative to `base_dir`) that are skipped entirely
    pub excluded_top_level: BTreeSet<String>,
    /// Extension selected and fence tag written
    pub content_type: ContentType,
}

impl ExportConfig {
    /// Config with the default top-level exclusions and content type
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            excluded_top_level: DEFAULT_EXCLUDED_DIRS.iter().map(|d| d.to_string()).collect(),
            content_type: ContentType::default(),
        }
    }

    /// Removes one name from the exclusion set. Returns false if it was not excluded.
    pub fn include(&mut self, name: &str) -> bool {
        self.excluded_top_level.remove(name)
    }

    pub fn include_all(&mut self) {
        self.excluded_top_level.clear();
    }

    fn is_excluded(&self, relative: &Path) -> bool {
        top_level_segment(relative)
            .and_then(|segment| segment.to_str())
            .is_some_and(|segment| self.excluded_top_level.contains(segment))
    }
}

/// Outcome of an export run
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub output: PathBuf,
    pub exported: Vec<String>,
}

/// Walks the base directory and reads every regular file of the configured content type.
///
/// Files under an excluded top-level name are never visited. Content is read as raw
/// bytes, so files in any encoding are carried over unchanged.
///
/// # Errors
///
/// - `FencepackError::InvalidPath` if the base directory is missing or not a directory.
/// - `FencepackError::WalkDir` or `FencepackError::Io` if traversal or reading fails.
pub fn collect_files(config: &ExportConfig) -> Result<Vec<FileRecord>> {
    let base = resolve_base_dir(&config.base_dir)?;
    let mut records = Vec::new();

    let walker = WalkDir::new(&base)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() != 1 || !config.is_excluded(Path::new(entry.file_name()))
        });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() || !config.content_type.matches(entry.path()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(&base) else {
            continue;
        };

        let content = fs::read(entry.path())?;
        debug!("Collected {} ({} bytes)", relative.display(), content.len());
        records.push(FileRecord::new(relative, content));
    }

    Ok(records)
}

/// Exports the tree described by `config` into a document at `output`.
///
/// An existing file at `output` is overwritten.
///
/// # Errors
///
/// Errors from [`collect_files`], or `FencepackError::Io` if the document cannot be written.
pub fn export_to_file(config: &ExportConfig, output: &Path) -> Result<ExportReport> {
    let records = collect_files(config)?;
    fs::write(output, render_document(&records, &config.content_type))?;

    debug!("{} file(s) exported to: {}", records.len(), output.display());

    Ok(ExportReport {
        output: output.to_path_buf(),
        exported: records.iter().map(FileRecord::wire_path).collect(),
    })
}
