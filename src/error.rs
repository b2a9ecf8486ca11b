use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for fencepack operations
#[derive(Error, Debug)]
pub enum FencepackError {
    /// IO error when reading files or directories
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Base directory is missing or not a directory
    #[error("Invalid path: {path}")]
    InvalidPath { path: PathBuf },

    /// Input document is missing, unreadable or not valid UTF-8
    #[error("Cannot read input Markdown file: {path} ({source})")]
    UnreadableInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Parent directory of an extracted file could not be created
    #[error("Failed to create directory: {path} ({source})")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Extracted file could not be written
    #[error("Failed to write file: {path} ({source})")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Block header names a path outside the target directory
    #[error("Path traversal detected (block path escapes target directory): {path}")]
    PathTraversal { path: String },

    /// `git status` could not be run or exited unsuccessfully
    #[error("Version control query failed: {message}")]
    VersionControlQuery { message: String },

    /// Operator declined to overwrite a working tree with uncommitted changes
    #[error("Aborted by user")]
    UserDeclined,

    /// Interactive prompt failed
    #[error("Prompt error: {message}")]
    Prompt { message: String },

    /// Regex compilation error
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// `WalkDir` error when traversing directories
    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FencepackError>;
