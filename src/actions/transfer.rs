//! Logged file moves, copies and deletes.
//!
//! # Overview
//!
//! Each helper performs one filesystem mutation and, once it succeeded,
//! appends the matching [`Operation`] to the log. Nothing is recorded for a
//! mutation that failed. Destinations are never overwritten; use
//! [`unique_destination`] to pick a free name first.
//!
//! # Safety Features
//!
//! - **Scan verification**: the `_verified` variants refuse to act on a file
//!   whose size or modification time changed since it was scanned
//! - **Preserve check**: [`validate_preserves_copy`] refuses a selection that
//!   would remove every copy of a duplicate group
//! - **Cross-device moves**: a rename that crosses filesystems falls back to
//!   copy then remove

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::oplog::{LogError, Operation, OperationKind, OperationLog};
use crate::scanner::FileRecord;

/// Errors from logged file actions.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The source does not exist.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The destination already exists.
    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// The file changed since it was scanned.
    #[error("file modified since scan: {0}")]
    Modified(PathBuf),

    /// The selection would remove every copy of a group.
    #[error("cannot remove all copies - at least one file must be preserved")]
    AllCopiesWouldBeRemoved,

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The mutation succeeded but could not be recorded.
    #[error("{path} was changed but not recorded: {source}")]
    NotRecorded {
        path: PathBuf,
        #[source]
        source: LogError,
    },
}

impl TransferError {
    fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Get the path associated with this error (if any).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::DestinationExists(p)
            | Self::Modified(p) => Some(p),
            Self::Io { path, .. } | Self::NotRecorded { path, .. } => Some(path),
            Self::AllCopiesWouldBeRemoved => None,
        }
    }
}

/// Move `source` to `destination` and record it.
///
/// Missing parent directories of `destination` are created.
///
/// # Errors
///
/// Returns [`TransferError::DestinationExists`] if `destination` is taken,
/// an I/O variant if the move fails, and [`TransferError::NotRecorded`] if
/// the file moved but the log append failed.
pub fn move_file(
    log: &OperationLog,
    source: &Path,
    destination: &Path,
    batch: Option<&str>,
) -> Result<Operation, TransferError> {
    check_source(source)?;
    prepare_destination(destination)?;
    relocate(source, destination).map_err(|e| TransferError::from_io(source, e))?;
    log::info!("Moved {} -> {}", source.display(), destination.display());
    record(log, OperationKind::Move, source, Some(destination), batch)
}

/// Copy `source` to `destination` and record it.
///
/// # Errors
///
/// See [`move_file`].
pub fn copy_file(
    log: &OperationLog,
    source: &Path,
    destination: &Path,
    batch: Option<&str>,
) -> Result<Operation, TransferError> {
    check_source(source)?;
    prepare_destination(destination)?;
    fs::copy(source, destination).map_err(|e| TransferError::from_io(source, e))?;
    log::info!("Copied {} -> {}", source.display(), destination.display());
    record(log, OperationKind::Copy, source, Some(destination), batch)
}

/// Permanently delete `path` and record it. The record is never undoable.
///
/// # Errors
///
/// Returns an I/O variant if the removal fails and
/// [`TransferError::NotRecorded`] if the log append failed.
pub fn delete_file(
    log: &OperationLog,
    path: &Path,
    batch: Option<&str>,
) -> Result<Operation, TransferError> {
    fs::remove_file(path).map_err(|e| TransferError::from_io(path, e))?;
    log::info!("Deleted {}", path.display());
    record(log, OperationKind::Delete, path, None, batch)
}

/// Move a scanned file after checking it still matches its record.
///
/// # Errors
///
/// Returns [`TransferError::Modified`] if the size or modification time
/// changed, otherwise see [`move_file`].
pub fn move_verified(
    log: &OperationLog,
    record: &FileRecord,
    destination: &Path,
    batch: Option<&str>,
) -> Result<Operation, TransferError> {
    verify_unchanged(record)?;
    move_file(log, &record.path, destination, batch)
}

/// Check that a scanned file's size and modification time are unchanged.
///
/// # Errors
///
/// Returns [`TransferError::Modified`] on a mismatch and an I/O variant if
/// the file cannot be inspected.
pub fn verify_unchanged(record: &FileRecord) -> Result<(), TransferError> {
    let metadata = fs::metadata(&record.path).map_err(|e| TransferError::from_io(&record.path, e))?;
    let modified = metadata
        .modified()
        .map_err(|e| TransferError::from_io(&record.path, e))?;

    if metadata.len() != record.size || modified != record.modified_at {
        log::warn!("File modified since scan: {}", record.path.display());
        return Err(TransferError::Modified(record.path.clone()));
    }
    Ok(())
}

/// Ensure at least one member of a group is left out of `selected`.
///
/// # Errors
///
/// Returns [`TransferError::AllCopiesWouldBeRemoved`] if every path of
/// `group` is selected.
pub fn validate_preserves_copy(group: &[PathBuf], selected: &[PathBuf]) -> Result<(), TransferError> {
    if !group.is_empty() && group.iter().all(|p| selected.contains(p)) {
        return Err(TransferError::AllCopiesWouldBeRemoved);
    }
    Ok(())
}

/// First free path for `file_name` in `dir`.
///
/// Tries `name.ext`, then `name_1.ext`, `name_2.ext`, and so on.
#[must_use]
pub fn unique_destination(dir: &Path, file_name: &OsStr) -> PathBuf {
    let candidate = dir.join(file_name);
    if candidate.symlink_metadata().is_err() {
        return candidate;
    }

    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .map_or_else(|| file_name.to_string_lossy(), OsStr::to_string_lossy);
    let extension = as_path.extension().map(OsStr::to_string_lossy);

    let mut counter = 1u32;
    loop {
        let name = match &extension {
            Some(ext) => format!("{stem}_{counter}.{ext}"),
            None => format!("{stem}_{counter}"),
        };
        let candidate = dir.join(name);
        if candidate.symlink_metadata().is_err() {
            return candidate;
        }
        counter += 1;
    }
}

/// Rename `from` to `to`, falling back to copy then remove across filesystems.
///
/// Missing parent directories of `to` are created. An existing `to` is
/// refused rather than replaced.
pub(crate) fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    if to.symlink_metadata().is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", to.display()),
        ));
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            log::debug!("Cross-device move, copying {}", from.display());
            fs::copy(from, to)?;
            if let Err(e) = fs::remove_file(from) {
                // Source is still intact; drop the partial copy
                let _ = fs::remove_file(to);
                return Err(e);
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
const CROSS_DEVICE: i32 = 18; // EXDEV

#[cfg(windows)]
const CROSS_DEVICE: i32 = 17; // ERROR_NOT_SAME_DEVICE

#[cfg(any(unix, windows))]
fn is_cross_device(error: &io::Error) -> bool {
    error.raw_os_error() == Some(CROSS_DEVICE)
}

#[cfg(not(any(unix, windows)))]
fn is_cross_device(_error: &io::Error) -> bool {
    false
}

fn check_source(source: &Path) -> Result<(), TransferError> {
    fs::symlink_metadata(source)
        .map(|_| ())
        .map_err(|e| TransferError::from_io(source, e))
}

fn prepare_destination(destination: &Path) -> Result<(), TransferError> {
    if destination.symlink_metadata().is_ok() {
        return Err(TransferError::DestinationExists(destination.to_path_buf()));
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| TransferError::from_io(parent, e))?;
    }
    Ok(())
}

fn record(
    log: &OperationLog,
    kind: OperationKind,
    source: &Path,
    destination: Option<&Path>,
    batch: Option<&str>,
) -> Result<Operation, TransferError> {
    log.record_in_batch(kind, source, destination, batch)
        .map_err(|source_err| {
            log::error!("{} {} performed but not recorded: {}", kind, source.display(), source_err);
            TransferError::NotRecorded {
                path: source.to_path_buf(),
                source: source_err,
            }
        })
}
