//! Scanner module for directory traversal and file hashing.
//!
//! This module provides functionality for:
//! - Parallel directory walking using jwalk
//! - Content hashing with BLAKE3
//! - Incremental scans backed by the [`crate::cache`] store
//! - Unicode path normalization for cache keys
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: BLAKE3 file hashing (streaming)
//! - [`path_utils`]: NFC-normalized relative keys and path depth
//! - [`scan`]: The [`Scanner`] that consults and refreshes the scan cache
//!
//! # Example
//!
//! ```no_run
//! use fileorg::scanner::{ScanOptions, Scanner};
//! use std::path::Path;
//!
//! let scanner = Scanner::new(ScanOptions::default());
//! let result = scanner.scan(Path::new(".")).unwrap();
//! println!("{} files, {} errors", result.records.len(), result.error_count);
//! ```

pub mod hasher;
pub mod path_utils;
pub mod scan;
pub mod walker;

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

// Re-export main types
pub use hasher::{hash_to_hex, hex_to_hash, Hash, Hasher};
pub use scan::{hash_records, ScanResult, Scanner};
pub use walker::{WalkEntry, Walker};

/// Metadata snapshot of one regular file, captured at scan time.
///
/// Records are never mutated after capture: a later scan produces a new
/// record for the same path, and attaching a content hash yields a new value
/// through [`FileRecord::with_hash`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path to the file
    #[serde(with = "path_utils::serde_path")]
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified_at: SystemTime,
    /// BLAKE3 digest of the content, computed lazily
    #[serde(
        default,
        with = "hasher::serde_hash",
        skip_serializing_if = "Option::is_none"
    )]
    pub content_hash: Option<Hash>,
}

impl FileRecord {
    /// Create a new record without a content hash.
    ///
    /// # Arguments
    ///
    /// * `path` - Absolute path to the file
    /// * `size` - File size in bytes
    /// * `modified_at` - Last modification time
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified_at: SystemTime) -> Self {
        Self {
            path,
            size,
            modified_at,
            content_hash: None,
        }
    }

    /// Return a copy of this record carrying the given content hash.
    #[must_use]
    pub fn with_hash(&self, hash: Hash) -> Self {
        Self {
            content_hash: Some(hash),
            ..self.clone()
        }
    }

    /// Whether `other` describes the same file state (size and modification time).
    ///
    /// Content is not compared: a file rewritten with a preserved
    /// modification time is indistinguishable here.
    #[must_use]
    pub fn same_state(&self, other: &FileRecord) -> bool {
        self.size == other.size && self.modified_at == other.modified_at
    }
}

/// Directory names excluded by default.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[".git", ".svn", "node_modules", "__pycache__", ".venv"];

/// Options controlling a scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Directory names to skip entirely (matched against the final path component).
    pub exclude_dirs: BTreeSet<String>,
    /// Include dotfiles and dot-directories.
    pub include_hidden: bool,
    /// Consult and refresh the scan cache.
    pub use_cache: bool,
    /// Worker threads used for content hashing.
    pub hash_threads: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| (*s).to_string()).collect(),
            include_hidden: false,
            use_cache: true,
            hash_threads: 4,
        }
    }
}

impl ScanOptions {
    /// Replace the excluded directory names.
    #[must_use]
    pub fn with_exclude_dirs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_dirs = names.into_iter().map(Into::into).collect();
        self
    }

    /// Include or skip hidden entries.
    #[must_use]
    pub fn with_include_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    /// Enable or disable the scan cache.
    #[must_use]
    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Set the number of hashing threads (at least one).
    #[must_use]
    pub fn with_hash_threads(mut self, threads: usize) -> Self {
        self.hash_threads = threads.max(1);
        self
    }
}

impl ScanOptions {
    /// The part of these options that decides which files a walk yields.
    #[must_use]
    pub fn scope(&self) -> ScanScope {
        ScanScope {
            exclude_dirs: self.exclude_dirs.clone(),
            include_hidden: self.include_hidden,
        }
    }
}

/// Walk filters a scan cache was built under.
///
/// A cache is only reused by a scan with an equal scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanScope {
    /// Excluded directory names, sorted.
    pub exclude_dirs: BTreeSet<String>,
    /// Whether hidden entries were walked.
    pub include_hidden: bool,
}

impl From<&crate::config::Config> for ScanOptions {
    fn from(config: &crate::config::Config) -> Self {
        Self::default()
            .with_exclude_dirs(config.exclude_dirs.iter().cloned())
            .with_include_hidden(config.include_hidden)
            .with_use_cache(config.use_cache)
            .with_hash_threads(config.hash_threads)
    }
}

/// Errors that can occur during directory scanning.
///
/// Per-entry errors are soft: they are counted in the [`ScanResult`] and the
/// walk continues. Only a missing or non-directory root aborts a scan.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    /// Classify an I/O error for a path.
    pub(crate) fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) | Self::NotADirectory(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl HashError {
    pub(crate) fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}
