//! Directory walker implementation using jwalk for parallel traversal.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for traversing a directory tree
//! and capturing a [`FileRecord`] for every regular file. It uses [`jwalk`]
//! for parallel directory reading.
//!
//! # Features
//!
//! - Parallel directory traversal using rayon thread pool
//! - Excluded directory names are pruned before their contents are read
//! - Hidden file filtering (dotfiles and dot-directories)
//! - Symbolic links are reported as files carrying their target's metadata,
//!   never traversed as directories
//! - Directory modification times are reported for cache validation
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use fileorg::scanner::{ScanOptions, WalkEntry, Walker};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Downloads"), ScanOptions::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(WalkEntry::File(file)) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Ok(WalkEntry::Directory { .. }) => {}
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use jwalk::WalkDir;

use super::{FileRecord, ScanError, ScanOptions};

/// One item produced by the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEntry {
    /// A regular file (or a symlink resolving to one).
    File(FileRecord),
    /// A traversed directory below the root, with its modification time.
    Directory {
        /// Absolute path of the directory
        path: PathBuf,
        /// Directory modification time
        modified_at: SystemTime,
    },
}

/// Directory walker for parallel file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Scan options (exclusions and hidden-file policy)
    options: ScanOptions,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    ///
    /// # Arguments
    ///
    /// * `path` - Root directory to scan
    /// * `options` - Scan options
    #[must_use]
    pub fn new(path: &Path, options: ScanOptions) -> Self {
        Self {
            root: path.to_path_buf(),
            options,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker will stop iteration
    /// as soon as possible.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the directory tree, yielding files and directories.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration. Children of each directory are visited in file name order.
    pub fn walk(&self) -> impl Iterator<Item = Result<WalkEntry, ScanError>> + '_ {
        let excluded = Arc::new(self.options.exclude_dirs.clone());

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .skip_hidden(!self.options.include_hidden)
            .process_read_dir(move |_depth, _path, _read_dir_state, children| {
                // Prune excluded directories before jwalk reads them
                children.retain(|child| match child {
                    Ok(entry) => {
                        !(entry.file_type().is_dir()
                            && excluded.contains(&*entry.file_name().to_string_lossy()))
                    }
                    Err(_) => true,
                });

                // Sort children for deterministic output
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir
            .into_iter()
            .take_while(move |_| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    false
                } else {
                    true
                }
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    let path = entry.path();

                    // The root is reported by the scanner, not the walk
                    if entry.depth == 0 {
                        return None;
                    }

                    if entry.file_type().is_dir() {
                        return Some(self.directory_entry(path));
                    }

                    self.file_entry(path, entry.file_type().is_symlink())
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    Some(Err(self.handle_jwalk_error(path, &e)))
                }
            })
    }

    fn directory_entry(&self, path: PathBuf) -> Result<WalkEntry, ScanError> {
        match fs::symlink_metadata(&path).and_then(|m| m.modified()) {
            Ok(modified_at) => Ok(WalkEntry::Directory { path, modified_at }),
            Err(e) => Err(self.handle_io_error(&path, e)),
        }
    }

    /// Build a record for a file or symlink entry.
    fn file_entry(&self, path: PathBuf, is_symlink: bool) -> Option<Result<WalkEntry, ScanError>> {
        // Symlinks resolve to their target's metadata
        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => return Some(Err(self.handle_io_error(&path, e))),
        };

        if !metadata.is_file() {
            log::trace!("Skipping non-regular entry: {}", path.display());
            return None;
        }

        if is_symlink {
            log::trace!("Following symlink as file: {}", path.display());
        }

        let modified_at = match metadata.modified() {
            Ok(t) => t,
            Err(e) => return Some(Err(self.handle_io_error(&path, e))),
        };

        Some(Ok(WalkEntry::File(FileRecord::new(
            path,
            metadata.len(),
            modified_at,
        ))))
    }

    /// Handle I/O errors during file access.
    fn handle_io_error(&self, path: &Path, error: io::Error) -> ScanError {
        match error.kind() {
            io::ErrorKind::PermissionDenied => log::warn!("Permission denied: {}", path.display()),
            io::ErrorKind::NotFound => {
                log::debug!("Entry vanished or dangling link: {}", path.display());
            }
            _ => log::warn!("I/O error for {}: {}", path.display(), error),
        }
        ScanError::from_io(path, error)
    }

    /// Handle jwalk errors.
    fn handle_jwalk_error(&self, path: PathBuf, error: &jwalk::Error) -> ScanError {
        log::warn!("Walker error for {}: {}", path.display(), error);
        let kind = error
            .io_error()
            .map_or(io::ErrorKind::Other, io::Error::kind);
        ScanError::from_io(&path, io::Error::new(kind, error.to_string()))
    }
}
