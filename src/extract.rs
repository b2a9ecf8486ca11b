use crate::document::{ContentType, FileRecord, parse_blocks};
use crate::error::{FencepackError, Result};
use crate::guard::{self, Confirmation, StatusQuery};
use crate::paths::{ExclusionRules, contained_relative_path, resolve_base_dir};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Configuration for extracting a document into a tree
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Directory the block paths are resolved against
    pub base_dir: PathBuf,
    /// Block paths to leave untouched
    pub exclusions: ExclusionRules,
    /// Fence tag that identifies blocks
    pub content_type: ContentType,
}

impl ExtractConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            exclusions: ExclusionRules::default(),
            content_type: ContentType::default(),
        }
    }
}

/// Options of the composed import run
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Skip the uncommitted-changes confirmation
    pub force: bool,
}

/// A block that could not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedBlock {
    pub path: String,
    pub error: String,
}

/// Outcome of an extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    /// Number of well-formed blocks in the document
    pub blocks_found: usize,
    /// Block paths written, as they appear in the document
    pub written: Vec<String>,
    /// Block paths matched by an exclusion rule
    pub skipped: Vec<String>,
    pub failed: Vec<FailedBlock>,
}

impl ExtractReport {
    pub fn files_written(&self) -> usize {
        self.written.len()
    }

    /// True if the document contained no blocks at all
    pub fn is_empty(&self) -> bool {
        self.blocks_found == 0
    }
}

/// Reads the whole input document.
///
/// # Errors
///
/// `FencepackError::UnreadableInput` if the file is missing or unreadable.
pub fn read_document(input: &Path) -> Result<Vec<u8>> {
    if !input.is_file() {
        return Err(FencepackError::UnreadableInput {
            path: input.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "not a readable file"),
        });
    }
    fs::read(input).map_err(|source| FencepackError::UnreadableInput {
        path: input.to_path_buf(),
        source,
    })
}

fn write_file(full_path: &Path, content: &[u8]) -> Result<()> {
    if let Some(dir) = full_path.parent()
        && !dir.is_dir()
    {
        fs::create_dir_all(dir).map_err(|source| FencepackError::DirectoryCreation {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    fs::write(full_path, content).map_err(|source| FencepackError::Write {
        path: full_path.to_path_buf(),
        source,
    })
}

fn record_failure(report: &mut ExtractReport, path: String, e: &FencepackError) {
    error!("{e}");
    report.failed.push(FailedBlock {
        path,
        error: e.to_string(),
    });
}

/// Writes each record under the base directory, overwriting existing files.
///
/// Exclusion rules are matched against the path the record would be written to, so
/// `./tests/a.php` and `/tests/a.php` are both covered by a `tests` rule. A record
/// that fails to write is reported and the remaining records are still processed.
pub fn write_blocks(records: &[FileRecord], config: &ExtractConfig) -> ExtractReport {
    let mut report = ExtractReport {
        blocks_found: records.len(),
        ..ExtractReport::default()
    };

    for record in records {
        let path = record.wire_path();

        let relative = match contained_relative_path(&path) {
            Ok(relative) => relative,
            Err(e) => {
                record_failure(&mut report, path, &e);
                continue;
            }
        };

        if let Some(rule) = config.exclusions.matching(&relative) {
            info!("Skipped excluded file: {path} (rule: {})", rule.prefix());
            report.skipped.push(path);
            continue;
        }

        match write_file(&config.base_dir.join(&relative), record.content()) {
            Ok(()) => {
                info!("Extracted: {path}");
                report.written.push(path);
            }
            Err(e) => record_failure(&mut report, path, &e),
        }
    }

    report
}

/// Parses `document` and writes its blocks.
///
/// # Errors
///
/// Returns `FencepackError::Regex` if the block parser cannot be built.
pub fn extract_document(document: &[u8], config: &ExtractConfig) -> Result<ExtractReport> {
    let records = parse_blocks(document, &config.content_type)?;
    if records.is_empty() {
        warn!(
            "No {} code blocks found in Markdown file.",
            config.content_type.fence_tag
        );
        return Ok(ExtractReport::default());
    }

    let report = write_blocks(&records, config);
    debug!(
        "Extraction complete. {} file(s) written.",
        report.files_written()
    );
    Ok(report)
}

/// Full import: validate inputs, run the safety check, then extract.
///
/// # Errors
///
/// - `FencepackError::InvalidPath` if the target directory is missing or not a directory.
/// - `FencepackError::UnreadableInput` if the document cannot be read.
/// - `FencepackError::UserDeclined` if the operator refused to overwrite a dirty working tree.
/// - Errors from the confirmation boundary.
pub fn run_import(
    input: &Path,
    config: &ExtractConfig,
    options: ImportOptions,
    query: &dyn StatusQuery,
    confirmation: &dyn Confirmation,
) -> Result<ExtractReport> {
    let base_dir = resolve_base_dir(&config.base_dir)?;
    let document = read_document(input)?;

    let verdict = guard::check(&base_dir, options.force, query, confirmation)?;
    debug!("Safety check verdict: {verdict:?}");
    if !verdict.may_write() {
        return Err(FencepackError::UserDeclined);
    }

    let config = ExtractConfig {
        base_dir,
        ..config.clone()
    };
    extract_document(&document, &config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::render_document;
    use crate::export::{ExportConfig, collect_files};
    use crate::guard::VCS_MARKER;
    use crate::guard::testing::{FakeConfirm, FakeStatus};
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        WalkDir::new(dir)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                (
                    e.path().strip_prefix(dir).unwrap().to_path_buf(),
                    fs::read(e.path()).unwrap(),
                )
            })
            .collect()
    }

    fn write_tree(base: &Path, files: &[(&str, &str)]) {
        for (path, content) in files {
            let full = base.join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
    }

    const DOCUMENT: &str = concat!(
        "### `app/Models/User.php`\n\n```php\n<?php\nclass User {}\n```\n\n",
        "### `app/Http/Kernel.php`\n\n```php\n<?php\nclass Kernel {}\n```\n\n",
        "### `tests/UserTest.php`\n\n```php\n<?php\n```\n\n",
    );

    #[test]
    fn test_round_trip() {
        let source = TempDir::new().unwrap();
        write_tree(
            source.path(),
            &[
                ("app/Models/User.php", "<?php\nclass User {}\n"),
                ("app/Http/Kernel.php", "<?php\nclass Kernel {}"),
                ("empty.php", ""),
                ("deep/a/b/c/d.php", "<?php\n\n\n"),
                ("unicode.php", "<?php echo 'Привет 世界';\n"),
            ],
        );
        fs::write(source.path().join("legacy.php"), b"<?php echo 'caf\xe9';\n").unwrap();

        let content_type = ContentType::default();
        let records = collect_files(&ExportConfig::new(source.path())).unwrap();
        let document = render_document(&records, &content_type);

        let target = TempDir::new().unwrap();
        let report = extract_document(&document, &ExtractConfig::new(target.path())).unwrap();

        assert_eq!(report.files_written(), 6);
        assert!(report.failed.is_empty());
        assert_eq!(snapshot(source.path()), snapshot(target.path()));
    }

    #[test]
    fn test_idempotent() {
        let target = TempDir::new().unwrap();
        let config = ExtractConfig::new(target.path());

        extract_document(DOCUMENT.as_bytes(), &config).unwrap();
        let first = snapshot(target.path());
        extract_document(DOCUMENT.as_bytes(), &config).unwrap();

        assert_eq!(first, snapshot(target.path()));
    }

    #[test]
    fn test_overwrites_existing_files() {
        let target = TempDir::new().unwrap();
        write_tree(target.path(), &[("app/Models/User.php", "old content")]);

        extract_document(DOCUMENT.as_bytes(), &ExtractConfig::new(target.path())).unwrap();
        assert_eq!(
            fs::read_to_string(target.path().join("app/Models/User.php")).unwrap(),
            "<?php\nclass User {}"
        );
    }

    #[test]
    fn test_exclusions() {
        let target = TempDir::new().unwrap();
        let mut config = ExtractConfig::new(target.path());
        config.exclusions = ExclusionRules::new(["app\\Http", "tests/"]);

        let report = extract_document(DOCUMENT.as_bytes(), &config).unwrap();
        assert_eq!(report.blocks_found, 3);
        assert_eq!(report.written, vec!["app/Models/User.php"]);
        assert_eq!(report.skipped, vec!["app/Http/Kernel.php", "tests/UserTest.php"]);
        assert!(!target.path().join("app/Http").exists());
        assert!(!target.path().join("tests").exists());
    }

    #[test]
    fn test_exclusions_cover_dot_and_rooted_headers() {
        let target = TempDir::new().unwrap();
        let mut config = ExtractConfig::new(target.path());
        config.exclusions = ExclusionRules::new(["tests"]);

        let document = concat!(
            "### `./tests/a.php`\n\n```php\na\n```\n\n",
            "### `/tests/b.php`\n\n```php\nb\n```\n\n",
            "### `./app/c.php`\n\n```php\nc\n```\n\n",
        );
        let report = extract_document(document.as_bytes(), &config).unwrap();

        assert_eq!(report.skipped, vec!["./tests/a.php", "/tests/b.php"]);
        assert_eq!(report.written, vec!["./app/c.php"]);
        assert!(!target.path().join("tests").exists());
        assert_eq!(fs::read(target.path().join("app/c.php")).unwrap(), b"c");
    }

    #[test]
    fn test_no_blocks_is_not_an_error() {
        let target = TempDir::new().unwrap();
        let report =
            extract_document(b"# Nothing here\n", &ExtractConfig::new(target.path())).unwrap();
        assert!(report.is_empty());
        assert_eq!(report.files_written(), 0);
    }

    #[test]
    fn test_partial_failure_continues() {
        let target = TempDir::new().unwrap();
        // a regular file where the second block needs a directory
        write_tree(target.path(), &[("blocker", "not a directory")]);

        let document = concat!(
            "### `first.php`\n\n```php\n1\n```\n\n",
            "### `blocker/nested/second.php`\n\n```php\n2\n```\n\n",
            "### `third.php`\n\n```php\n3\n```\n\n",
        );
        let report = extract_document(document.as_bytes(), &ExtractConfig::new(target.path())).unwrap();

        assert_eq!(report.written, vec!["first.php", "third.php"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].path, "blocker/nested/second.php");
        assert!(report.failed[0].error.contains("Failed to create directory"));
        assert_eq!(fs::read_to_string(target.path().join("third.php")).unwrap(), "3");
    }

    #[test]
    fn test_traversal_is_reported_as_failure() {
        let outer = TempDir::new().unwrap();
        let target = outer.path().join("target");
        fs::create_dir(&target).unwrap();

        let document = concat!(
            "### `../escaped.php`\n\n```php\nx\n```\n\n",
            "### `/rooted.php`\n\n```php\ny\n```\n\n",
        );
        let report = extract_document(document.as_bytes(), &ExtractConfig::new(&target)).unwrap();

        assert_eq!(report.written, vec!["/rooted.php"]);
        assert_eq!(report.failed.len(), 1);
        assert!(!outer.path().join("escaped.php").exists());
        assert!(target.join("rooted.php").exists());
    }

    #[test]
    fn test_read_document_missing() {
        let temp_dir = TempDir::new().unwrap();
        let result = read_document(&temp_dir.path().join("php_files.md"));
        assert!(matches!(result, Err(FencepackError::UnreadableInput { .. })));

        let result = read_document(temp_dir.path());
        assert!(matches!(result, Err(FencepackError::UnreadableInput { .. })));
    }

    fn dirty_repo_with_document() -> (TempDir, PathBuf) {
        let target = TempDir::new().unwrap();
        fs::create_dir(target.path().join(VCS_MARKER)).unwrap();
        let input = target.path().join("php_files.md");
        fs::write(&input, DOCUMENT).unwrap();
        (target, input)
    }

    #[test]
    fn test_import_declined_writes_nothing() {
        let (target, input) = dirty_repo_with_document();
        let config = ExtractConfig::new(target.path());

        let result = run_import(
            &input,
            &config,
            ImportOptions::default(),
            &FakeStatus(Some(" M app/Models/User.php\n")),
            &FakeConfirm::answering(false),
        );

        assert!(matches!(result, Err(FencepackError::UserDeclined)));
        assert!(!target.path().join("app").exists());
    }

    #[test]
    fn test_import_confirmed_writes() {
        let (target, input) = dirty_repo_with_document();
        let report = run_import(
            &input,
            &ExtractConfig::new(target.path()),
            ImportOptions::default(),
            &FakeStatus(Some(" M app/Models/User.php\n")),
            &FakeConfirm::answering(true),
        )
        .unwrap();
        assert_eq!(report.files_written(), 3);
    }

    #[test]
    fn test_import_forced_ignores_repository_state() {
        let (target, input) = dirty_repo_with_document();
        let confirm = FakeConfirm::answering(false);
        let report = run_import(
            &input,
            &ExtractConfig::new(target.path()),
            ImportOptions { force: true },
            &FakeStatus(Some(" M app/Models/User.php\n")),
            &confirm,
        )
        .unwrap();

        assert_eq!(report.files_written(), 3);
        assert!(!confirm.asked.get());
    }

    #[test]
    fn test_import_validates_before_asking() {
        let (target, _input) = dirty_repo_with_document();
        let confirm = FakeConfirm::answering(true);

        let result = run_import(
            &target.path().join("missing.md"),
            &ExtractConfig::new(target.path()),
            ImportOptions::default(),
            &FakeStatus(Some(" M a.php\n")),
            &confirm,
        );
        assert!(matches!(result, Err(FencepackError::UnreadableInput { .. })));

        let result = run_import(
            &target.path().join("php_files.md"),
            &ExtractConfig::new(target.path().join("missing")),
            ImportOptions::default(),
            &FakeStatus(Some(" M a.php\n")),
            &confirm,
        );
        assert!(matches!(result, Err(FencepackError::InvalidPath { .. })));
        assert!(!confirm.asked.get());
    }
}
