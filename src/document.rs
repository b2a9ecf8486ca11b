//! The document grammar: one labeled, fenced block per file.
//!
//! ````text
//! ### `app/Models/User.php`
//!
//! ```php
//! <?php
//! ```
//! ````

use crate::error::Result;
use crate::paths::normalize_separators;
use regex::bytes::Regex;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

/// Opening and closing marker of a fenced region
pub const FENCE: &str = "```";

/// The single content type embedded in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// File extension selected when exporting, without the dot
    pub extension: String,
    /// Language tag written after the opening fence
    pub fence_tag: String,
}

impl ContentType {
    /// Content type whose fence tag is the extension itself (`php` -> ```` ```php ````)
    pub fn new(extension: &str) -> Self {
        let extension = extension.trim_start_matches('.');
        Self {
            extension: extension.to_string(),
            fence_tag: extension.to_string(),
        }
    }

    /// True if the path has exactly this extension (case-sensitive)
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.extension)
    }

    fn is_open_fence(&self, line: &[u8]) -> bool {
        line.strip_prefix(FENCE.as_bytes())
            .and_then(|rest| rest.strip_prefix(self.fence_tag.as_bytes()))
            .is_some_and(|rest| rest.trim_ascii().is_empty())
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self::new("php")
    }
}

/// One file: a relative path and its raw content bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    path: PathBuf,
    content: Vec<u8>,
}

impl FileRecord {
    /// Record for a path already in platform form
    pub fn new(path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Record for a path as written in a block header, with either separator style
    pub fn from_wire(path: &str, content: impl Into<Vec<u8>>) -> Self {
        Self::new(normalize_separators(path), content)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The path with `/` separators, as written into headers
    pub fn wire_path(&self) -> String {
        self.path.to_string_lossy().replace(MAIN_SEPARATOR, "/")
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

/// Renders one block, including the blank line that separates it from the next.
///
/// Content bytes are copied verbatim, whatever their encoding.
pub fn render_block(record: &FileRecord, content_type: &ContentType) -> Vec<u8> {
    let mut block = format!(
        "### `{}`\n\n{FENCE}{}\n",
        record.wire_path(),
        content_type.fence_tag
    )
    .into_bytes();
    block.extend_from_slice(record.content());
    block.extend_from_slice(format!("\n{FENCE}\n\n").as_bytes());
    block
}

/// Concatenates the blocks of all records in the given order.
pub fn render_document(records: &[FileRecord], content_type: &ContentType) -> Vec<u8> {
    records
        .iter()
        .flat_map(|record| render_block(record, content_type))
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    start: usize,
    text: &'a [u8],
}

fn split_lines(document: &[u8]) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for raw in document.split_inclusive(|&b| b == b'\n') {
        let text = raw.strip_suffix(b"\n").unwrap_or(raw);
        let text = text.strip_suffix(b"\r").unwrap_or(text);
        lines.push(Line { start, text });
        start += raw.len();
    }
    lines
}

/// Extracts every well-formed block, in order of appearance.
///
/// A block is a `### `path`` header line, any number of blank lines, an opening
/// fence tagged with the content type, the raw content, and the first following
/// line that begins with a fence. Exactly one trailing newline is dropped from the
/// captured content, undoing the newline [`render_block`] puts before the closing
/// fence. Headers without a matching fence and fences that never close are skipped.
///
/// Only header paths are decoded as UTF-8; content stays as raw bytes. Content is
/// not escaped, so a line starting with a fence inside a file ends its block early.
///
/// # Errors
///
/// Returns `FencepackError::Regex` if the header pattern fails to compile.
pub fn parse_blocks(document: &[u8], content_type: &ContentType) -> Result<Vec<FileRecord>> {
    let header = Regex::new(r"^###\s+`(.+)`\s*$")?;
    let lines = split_lines(document);
    let mut records = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let Some(path) = header
            .captures(lines[i].text)
            .and_then(|c| c.get(1))
            .map(|m| String::from_utf8_lossy(m.as_bytes()))
        else {
            i += 1;
            continue;
        };

        let mut fence = i + 1;
        while fence < lines.len() && lines[fence].text.trim_ascii().is_empty() {
            fence += 1;
        }
        if fence >= lines.len() || !content_type.is_open_fence(lines[fence].text) {
            i += 1;
            continue;
        }

        let content_start = lines
            .get(fence + 1)
            .map_or(document.len(), |line| line.start);
        let Some(close) =
            (fence + 1..lines.len()).find(|&k| lines[k].text.starts_with(FENCE.as_bytes()))
        else {
            i += 1;
            continue;
        };

        let raw = &document[content_start..lines[close].start];
        let content = raw.strip_suffix(b"\n").unwrap_or(raw);
        records.push(FileRecord::from_wire(&path, content));
        i = close + 1;
    }

    Ok(records)
}
