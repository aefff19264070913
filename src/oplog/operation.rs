//! Logged filesystem operations.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scanner::{Hash, HashError, Hasher};

/// Kind of filesystem mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// `source` was moved to `destination`
    Move,
    /// `source` was copied to `destination`
    Copy,
    /// `source` was deleted; never undoable
    Delete,
}

impl OperationKind {
    /// Name stored in the log.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Copy => "copy",
            Self::Delete => "delete",
        }
    }

    /// Whether operations of this kind record a destination.
    #[must_use]
    pub fn has_destination(self) -> bool {
        !matches!(self, Self::Delete)
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "move" => Ok(Self::Move),
            "copy" => Ok(Self::Copy),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown operation kind '{other}'")),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Undo status. Changes at most once, away from `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Performed and not yet undone
    Pending,
    /// Successfully reversed
    Undone,
    /// Reversal was attempted and failed
    Failed,
}

impl OperationStatus {
    /// Name stored in the log.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Undone => "undone",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for OperationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "undone" => Ok(Self::Undone),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown operation status '{other}'")),
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the destination file captured when the operation was recorded.
///
/// Undo compares the current destination against it to detect user changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified_at: SystemTime,
    /// Content digest, when content fingerprints are enabled
    pub hash: Option<Hash>,
}

impl FileFingerprint {
    /// Capture size and modification time of `path`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the metadata cannot be read.
    pub fn capture(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self {
            size: metadata.len(),
            modified_at: metadata.modified()?,
            hash: None,
        })
    }

    /// Capture metadata and the content digest of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be read.
    pub fn capture_with_hash(path: &Path, hasher: &Hasher) -> Result<Self, HashError> {
        let mut fingerprint = Self::capture(path).map_err(|e| HashError::from_io(path, e))?;
        fingerprint.hash = Some(hasher.full_hash(path)?);
        Ok(fingerprint)
    }

    /// Whether `current` differs from this recorded fingerprint.
    ///
    /// Hashes are compared only when both sides carry one.
    #[must_use]
    pub fn differs_from(&self, current: &FileFingerprint) -> bool {
        if self.size != current.size || self.modified_at != current.modified_at {
            return true;
        }
        matches!((self.hash, current.hash), (Some(a), Some(b)) if a != b)
    }
}

/// One logged filesystem mutation.
///
/// Everything except `status` (and the `error` recorded with a failed
/// reversal) is fixed once the operation is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Log-assigned id, strictly increasing and never reused
    pub id: i64,
    /// Kind of mutation
    pub kind: OperationKind,
    /// Original location
    pub source: PathBuf,
    /// New location, for moves and copies
    pub destination: Option<PathBuf>,
    /// When the operation was recorded
    pub timestamp: DateTime<Utc>,
    /// Undo status
    pub status: OperationStatus,
    /// Optional label grouping operations performed together
    pub batch: Option<String>,
    /// Destination state right after the mutation
    pub fingerprint: Option<FileFingerprint>,
    /// Why the reversal failed, for `Failed` operations
    pub error: Option<String>,
}

impl Operation {
    /// Whether undo may be attempted: a pending move or copy.
    #[must_use]
    pub fn is_undoable(&self) -> bool {
        self.status == OperationStatus::Pending && self.kind.has_destination()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} {}", self.id, self.kind, self.source.display())?;
        if let Some(dest) = &self.destination {
            write!(f, " -> {}", dest.display())?;
        }
        write!(f, " [{}]", self.status)
    }
}

/// Split a timestamp into whole seconds and nanoseconds relative to the epoch.
///
/// Seconds are floored, so nanoseconds are always non-negative.
pub(crate) fn split_time(time: SystemTime) -> (i64, u32) {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => (d.as_secs() as i64, d.subsec_nanos()),
        Err(e) => {
            let d = e.duration();
            if d.subsec_nanos() == 0 {
                (-(d.as_secs() as i64), 0)
            } else {
                (-(d.as_secs() as i64) - 1, 1_000_000_000 - d.subsec_nanos())
            }
        }
    }
}

/// Inverse of [`split_time`].
pub(crate) fn join_time(secs: i64, nanos: u32) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::new(secs as u64, nanos)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + Duration::from_nanos(u64::from(nanos))
    }
}
