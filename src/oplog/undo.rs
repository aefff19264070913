//! Reversal of logged operations.
//!
//! # Safety Checks
//!
//! Before touching the filesystem, [`UndoEngine::undo`] verifies, in order:
//!
//! 1. The operation exists ([`UndoError::NotFound`])
//! 2. It is a pending move or copy ([`UndoError::NotUndoable`])
//! 3. For a move, the file is still at its destination ([`UndoError::DestinationMissing`])
//! 4. The destination still matches the fingerprint taken when the
//!    operation was recorded ([`UndoError::DestinationModified`])
//! 5. For a move, nothing occupies the original source path ([`UndoError::SourceOccupied`])
//!
//! A failed check leaves both the filesystem and the log untouched. Once the
//! checks pass, the status becomes `undone` only after the reversing call
//! succeeds; if it fails, the status becomes `failed` and the error is
//! returned.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::operation::{FileFingerprint, Operation, OperationKind, OperationStatus};
use super::store::{LogError, OperationLog};
use crate::actions::relocate;
use crate::scanner::Hasher;

/// Errors from undoing an operation.
#[derive(Debug, Error)]
pub enum UndoError {
    /// No operation has this id.
    #[error("Operation {0} not found")]
    NotFound(i64),

    /// The operation is a delete or is no longer pending.
    #[error("Operation {id} cannot be undone: {reason}")]
    NotUndoable { id: i64, reason: String },

    /// The destination changed since the operation was recorded.
    #[error("Operation {id}: {path} was modified after the operation")]
    DestinationModified { id: i64, path: PathBuf },

    /// The moved file is no longer at its destination.
    #[error("Operation {id}: {path} no longer exists")]
    DestinationMissing { id: i64, path: PathBuf },

    /// Something already exists at the original source path.
    #[error("Operation {id}: {path} is occupied")]
    SourceOccupied { id: i64, path: PathBuf },

    /// The reversing filesystem call failed; the operation is now `failed`.
    #[error("Operation {id}: reversal failed: {source}")]
    ReversalFailed {
        id: i64,
        #[source]
        source: io::Error,
    },

    /// The log could not be read or updated.
    #[error(transparent)]
    Log(#[from] LogError),
}

impl UndoError {
    /// Id of the operation this error concerns, if any.
    #[must_use]
    pub fn operation_id(&self) -> Option<i64> {
        match self {
            Self::NotFound(id)
            | Self::NotUndoable { id, .. }
            | Self::DestinationModified { id, .. }
            | Self::DestinationMissing { id, .. }
            | Self::SourceOccupied { id, .. }
            | Self::ReversalFailed { id, .. } => Some(*id),
            Self::Log(LogError::TransitionRejected { id }) => Some(*id),
            Self::Log(_) => None,
        }
    }
}

/// Outcome of undoing a batch.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Operations reversed, in the order they were undone
    pub undone: Vec<Operation>,
    /// Operations that could not be reversed
    pub failed: Vec<UndoError>,
}

impl UndoReport {
    /// Number of operations reversed.
    #[must_use]
    pub fn undone_count(&self) -> usize {
        self.undone.len()
    }

    /// Number of operations that could not be reversed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Whether every attempted reversal succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Validates and reverses operations recorded in an [`OperationLog`].
#[derive(Debug, Clone, Copy)]
pub struct UndoEngine<'a> {
    log: &'a OperationLog,
}

impl<'a> UndoEngine<'a> {
    /// Create an engine over `log`.
    #[must_use]
    pub fn new(log: &'a OperationLog) -> Self {
        Self { log }
    }

    /// Run every precondition for undoing `id` without side effects.
    ///
    /// # Errors
    ///
    /// Returns the first violated precondition.
    pub fn check(&self, id: i64) -> Result<Operation, UndoError> {
        let op = self.log.get(id)?.ok_or(UndoError::NotFound(id))?;

        if op.kind == OperationKind::Delete {
            return Err(UndoError::NotUndoable {
                id,
                reason: "deletes are permanent".to_string(),
            });
        }
        if op.status != OperationStatus::Pending {
            return Err(UndoError::NotUndoable {
                id,
                reason: format!("already {}", op.status),
            });
        }

        let Some(destination) = op.destination.as_deref() else {
            return Err(UndoError::NotUndoable {
                id,
                reason: "no destination recorded".to_string(),
            });
        };

        let present = destination.symlink_metadata().is_ok();
        if op.kind == OperationKind::Move && !present {
            return Err(UndoError::DestinationMissing {
                id,
                path: destination.to_path_buf(),
            });
        }

        if present {
            if let Some(recorded) = &op.fingerprint {
                if destination_changed(recorded, destination) {
                    return Err(UndoError::DestinationModified {
                        id,
                        path: destination.to_path_buf(),
                    });
                }
            }
        }

        if op.kind == OperationKind::Move && op.source.symlink_metadata().is_ok() {
            return Err(UndoError::SourceOccupied {
                id,
                path: op.source.clone(),
            });
        }

        Ok(op)
    }

    /// Reverse operation `id`.
    ///
    /// A move is reversed by moving the destination back to the source; a
    /// copy by deleting the destination. A copy whose destination is already
    /// gone counts as undone. Returns the operation with its new status.
    ///
    /// # Errors
    ///
    /// Returns a precondition error with no side effect, or
    /// [`UndoError::ReversalFailed`] after marking the operation `failed`.
    pub fn undo(&self, id: i64) -> Result<Operation, UndoError> {
        let op = self.check(id)?;
        let Some(destination) = op.destination.as_deref() else {
            return Err(UndoError::NotUndoable {
                id,
                reason: "no destination recorded".to_string(),
            });
        };

        let result = match op.kind {
            OperationKind::Move => relocate(destination, &op.source),
            OperationKind::Copy => remove_copy(destination),
            OperationKind::Delete => {
                return Err(UndoError::NotUndoable {
                    id,
                    reason: "deletes are permanent".to_string(),
                })
            }
        };

        match result {
            Ok(()) => {
                if let Err(e) = self.log.mark(id, OperationStatus::Undone, None) {
                    log::error!(
                        "Undid {} on disk but could not mark it undone, log still says pending: {}",
                        op,
                        e
                    );
                    return Err(e.into());
                }
                log::info!("Undid {}", op);
                Ok(Operation {
                    status: OperationStatus::Undone,
                    ..op
                })
            }
            Err(source) => {
                log::error!("Failed to undo {}: {}", op, source);
                if let Err(e) = self.log.mark(id, OperationStatus::Failed, Some(&source.to_string())) {
                    log::error!("Could not mark operation {} failed: {}", id, e);
                }
                Err(UndoError::ReversalFailed { id, source })
            }
        }
    }

    /// Undo every pending move and copy of `batch`, most recent first.
    ///
    /// Continues past individual failures and reports them.
    ///
    /// # Errors
    ///
    /// Returns [`UndoError::Log`] only if the batch cannot be listed.
    pub fn undo_batch(&self, batch: &str) -> Result<UndoReport, UndoError> {
        let operations = self.log.list_undoable_in_batch(batch)?;
        let mut report = UndoReport::default();

        for op in operations {
            match self.undo(op.id) {
                Ok(done) => report.undone.push(done),
                Err(e) => {
                    log::warn!("{}", e);
                    report.failed.push(e);
                }
            }
        }

        log::info!(
            "Batch {}: {} undone, {} failed",
            batch,
            report.undone_count(),
            report.failed_count()
        );
        Ok(report)
    }
}

fn destination_changed(recorded: &FileFingerprint, destination: &Path) -> bool {
    let current = if recorded.hash.is_some() {
        FileFingerprint::capture_with_hash(destination, &Hasher::new()).ok()
    } else {
        FileFingerprint::capture(destination).ok()
    };
    current.map_or(true, |current| recorded.differs_from(&current))
}

fn remove_copy(destination: &Path) -> io::Result<()> {
    match fs::remove_file(destination) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("Copy {} already removed", destination.display());
            Ok(())
        }
        other => other,
    }
}
