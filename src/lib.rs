//! # fencepack
//!
//! Packs a project's source tree into a single Markdown document, one fenced block
//! per file, and unpacks such a document back into a tree.
//!
//! ## Features
//!
//! - Export every file of one content type (PHP by default) under a directory
//! - Skip whole top-level directories such as `vendor/` or `config/` on export
//! - Extract blocks back to their paths, with prefix-based exclusions
//! - Refuse to overwrite a git working tree with uncommitted changes unless confirmed
//!
//! ## Usage
//!
//! ### As a Library
//!
//! ```no_run
//! use fencepack::{ExportConfig, ExtractConfig, export_to_file, extract_document};
//! use std::path::Path;
//!
//! let report = export_to_file(&ExportConfig::new("my-app"), Path::new("php_files.md"))?;
//! println!("{} files exported", report.exported.len());
//!
//! let document = std::fs::read("php_files.md")?;
//! let report = extract_document(&document, &ExtractConfig::new("restored"))?;
//! println!("{} files written", report.files_written());
//! # Ok::<(), fencepack::FencepackError>(())
//! ```
//!
//! ### As a CLI Tool
//!
//! ```bash
//! # Pack a project, including its vendor directory
//! fencepack export my-app --include-vendor --output app.md
//!
//! # Unpack into the current directory, leaving tests/ alone
//! fencepack import --input app.md --exclude tests
//! ```

pub mod document;
pub mod error;
pub mod export;
pub mod extract;
pub mod guard;
pub mod paths;

/// Document file name used when none is given
pub const DEFAULT_DOCUMENT: &str = "php_files.md";

// Re-export main types and functions for convenience
pub use document::{ContentType, FileRecord, parse_blocks, render_document};
pub use error::{FencepackError, Result};
pub use export::{DEFAULT_EXCLUDED_DIRS, ExportConfig, ExportReport, export_to_file};
pub use extract::{ExtractConfig, ExtractReport, ImportOptions, extract_document, run_import};
pub use guard::{Confirmation, GitCli, RepositoryState, StatusQuery, Verdict};
pub use paths::{ExclusionRule, ExclusionRules};
