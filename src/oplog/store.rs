//! SQLite-backed append-only operation log.
//!
//! Ids come from an `INTEGER PRIMARY KEY AUTOINCREMENT` column, so SQLite
//! never hands out an id twice, even after the newest rows are gone or the
//! process restarts. All access goes through one connection behind a mutex:
//! id assignment and the insert happen in the same statement, and writers
//! are serialized within the process.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;

use super::operation::{
    join_time, split_time, FileFingerprint, Operation, OperationKind, OperationStatus,
};
use crate::scanner::{hash_to_hex, hex_to_hash, Hasher};

/// Schema version stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS operations (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    kind             TEXT NOT NULL CHECK (kind IN ('move', 'copy', 'delete')),
    source           TEXT NOT NULL,
    destination      TEXT,
    timestamp        TEXT NOT NULL,
    status           TEXT NOT NULL DEFAULT 'pending'
                     CHECK (status IN ('pending', 'undone', 'failed')),
    batch            TEXT,
    dest_size        INTEGER,
    dest_mtime_secs  INTEGER,
    dest_mtime_nanos INTEGER,
    dest_hash        TEXT,
    error            TEXT
);
CREATE INDEX IF NOT EXISTS idx_operations_status ON operations(status);
CREATE INDEX IF NOT EXISTS idx_operations_batch ON operations(batch);
";

const COLUMNS: &str = "id, kind, source, destination, timestamp, status, batch, \
                       dest_size, dest_mtime_secs, dest_mtime_nanos, dest_hash, error";

/// Errors from the operation log.
#[derive(Debug, Error)]
pub enum LogError {
    /// The database could not be opened.
    #[error("failed to open operation log at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// The directory holding the database could not be created.
    #[error("failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A statement failed.
    #[error("operation log query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database was written by a newer schema.
    #[error("operation log schema version {found} is not supported (expected {expected})")]
    UnsupportedSchema { found: i64, expected: i64 },

    /// Paths are stored as text and must be valid UTF-8.
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    /// Moves and copies must name a destination.
    #[error("{0} operation requires a destination")]
    MissingDestination(OperationKind),

    /// A stored row could not be decoded.
    #[error("invalid row {id}: {reason}")]
    InvalidRow { id: i64, reason: String },

    /// A status change was attempted on an operation that is no longer pending.
    #[error("operation {id} is not pending")]
    TransitionRejected { id: i64 },

    /// Another thread panicked while holding the connection.
    #[error("operation log lock poisoned")]
    LockPoisoned,
}

/// Result type for log operations.
pub type LogResult<T> = Result<T, LogError>;

/// Totals by kind and status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogStats {
    pub total: usize,
    pub moves: usize,
    pub copies: usize,
    pub deletes: usize,
    pub pending: usize,
    pub undone: usize,
    pub failed: usize,
}

/// Persistent, append-only log of performed operations.
pub struct OperationLog {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    content_fingerprints: bool,
}

impl std::fmt::Debug for OperationLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationLog")
            .field("path", &self.path)
            .field("content_fingerprints", &self.content_fingerprints)
            .finish_non_exhaustive()
    }
}

impl OperationLog {
    /// Open or create the log at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Open`] if the database cannot be opened and
    /// [`LogError::UnsupportedSchema`] if it was created by a newer version.
    pub fn open(path: &Path) -> LogResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| LogError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(|source| LogError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = FULL;
             PRAGMA busy_timeout = 5000;",
        )?;

        let log = Self::init(conn, Some(path.to_path_buf()))?;
        log::debug!("Opened operation log at {}", path.display());
        Ok(log)
    }

    /// Open a log that lives only as long as the returned value.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Open`] if SQLite cannot create the database.
    pub fn open_in_memory() -> LogResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| LogError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> LogResult<Self> {
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            return Err(LogError::UnsupportedSchema {
                found: version,
                expected: SCHEMA_VERSION,
            });
        }

        conn.execute_batch(SCHEMA)?;
        if version < SCHEMA_VERSION {
            conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
            log::debug!("Initialized operation log schema version {}", SCHEMA_VERSION);
        }

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            content_fingerprints: false,
        })
    }

    /// Also hash the destination when recording, so undo can detect
    /// content changes made under a preserved modification time.
    #[must_use]
    pub fn with_content_fingerprints(mut self, enabled: bool) -> Self {
        self.content_fingerprints = enabled;
        self
    }

    /// Database file, or `None` for an in-memory log.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> LogResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| LogError::LockPoisoned)
    }

    /// Append a performed operation and return it with its new id.
    ///
    /// Call right after the filesystem mutation succeeded. For moves and
    /// copies the destination's current state is captured as the fingerprint
    /// undo will check against.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::MissingDestination`] for a move or copy without a
    /// destination, [`LogError::NonUtf8Path`] for paths that cannot be
    /// stored, and [`LogError::Sqlite`] if the insert fails.
    pub fn record(
        &self,
        kind: OperationKind,
        source: &Path,
        destination: Option<&Path>,
    ) -> LogResult<Operation> {
        self.record_in_batch(kind, source, destination, None)
    }

    /// Append a performed operation carrying a batch label.
    ///
    /// # Errors
    ///
    /// See [`OperationLog::record`].
    pub fn record_in_batch(
        &self,
        kind: OperationKind,
        source: &Path,
        destination: Option<&Path>,
        batch: Option<&str>,
    ) -> LogResult<Operation> {
        let destination = if kind.has_destination() {
            Some(destination.ok_or(LogError::MissingDestination(kind))?)
        } else {
            None
        };

        let source_text = path_text(source)?;
        let destination_text = destination.map(path_text).transpose()?;
        let fingerprint = destination.and_then(|d| self.capture_fingerprint(d));
        let timestamp = Utc::now();

        let (size, secs, nanos, hash) = match &fingerprint {
            Some(fp) => {
                let (secs, nanos) = split_time(fp.modified_at);
                (
                    Some(fp.size as i64),
                    Some(secs),
                    Some(i64::from(nanos)),
                    fp.hash.as_ref().map(hash_to_hex),
                )
            }
            None => (None, None, None, None),
        };

        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO operations
                    (kind, source, destination, timestamp, status, batch,
                     dest_size, dest_mtime_secs, dest_mtime_nanos, dest_hash)
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6, ?7, ?8, ?9)",
                params![
                    kind.as_str(),
                    source_text,
                    destination_text,
                    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
                    batch,
                    size,
                    secs,
                    nanos,
                    hash,
                ],
            )?;
            conn.last_insert_rowid()
        };

        let operation = Operation {
            id,
            kind,
            source: source.to_path_buf(),
            destination: destination.map(Path::to_path_buf),
            timestamp,
            status: OperationStatus::Pending,
            batch: batch.map(str::to_string),
            fingerprint,
            error: None,
        };
        log::debug!("Recorded {}", operation);
        Ok(operation)
    }

    fn capture_fingerprint(&self, destination: &Path) -> Option<FileFingerprint> {
        let captured = if self.content_fingerprints {
            FileFingerprint::capture_with_hash(destination, &Hasher::new()).map_err(|e| e.to_string())
        } else {
            FileFingerprint::capture(destination).map_err(|e| e.to_string())
        };
        match captured {
            Ok(fp) => Some(fp),
            Err(e) => {
                log::warn!(
                    "Could not fingerprint {}: {}; undo will not detect changes",
                    destination.display(),
                    e
                );
                None
            }
        }
    }

    /// Look up an operation by id.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] if the query fails or the row cannot be decoded.
    pub fn get(&self, id: i64) -> LogResult<Option<Operation>> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM operations WHERE id = ?1"),
                [id],
                RawOperation::from_row,
            )
            .optional()?;
        raw.map(RawOperation::into_operation).transpose()
    }

    /// Pending moves and copies, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] if the query fails or a row cannot be decoded.
    pub fn list_undoable(&self, limit: usize) -> LogResult<Vec<Operation>> {
        self.query(
            &format!(
                "SELECT {COLUMNS} FROM operations
                 WHERE status = 'pending' AND kind IN ('move', 'copy')
                 ORDER BY id DESC LIMIT ?1"
            ),
            params![limit_param(limit)],
        )
    }

    /// Pending moves and copies carrying `batch`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] if the query fails or a row cannot be decoded.
    pub fn list_undoable_in_batch(&self, batch: &str) -> LogResult<Vec<Operation>> {
        self.query(
            &format!(
                "SELECT {COLUMNS} FROM operations
                 WHERE status = 'pending' AND kind IN ('move', 'copy') AND batch = ?1
                 ORDER BY id DESC"
            ),
            params![batch],
        )
    }

    /// Operations of every kind and status, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] if the query fails or a row cannot be decoded.
    pub fn list_recent(&self, limit: usize) -> LogResult<Vec<Operation>> {
        self.query(
            &format!("SELECT {COLUMNS} FROM operations ORDER BY id DESC LIMIT ?1"),
            params![limit_param(limit)],
        )
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> LogResult<Vec<Operation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, RawOperation::from_row)?;

        let mut operations = Vec::new();
        for row in rows {
            operations.push(row?.into_operation()?);
        }
        Ok(operations)
    }

    /// Totals by kind and status.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Sqlite`] if the query fails.
    pub fn stats(&self) -> LogResult<LogStats> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT kind, status, COUNT(*) FROM operations GROUP BY kind, status")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut stats = LogStats::default();
        for row in rows {
            let (kind, status, count) = row?;
            let count = usize::try_from(count).unwrap_or(0);
            stats.total += count;
            match kind.as_str() {
                "move" => stats.moves += count,
                "copy" => stats.copies += count,
                _ => stats.deletes += count,
            }
            match status.as_str() {
                "pending" => stats.pending += count,
                "undone" => stats.undone += count,
                _ => stats.failed += count,
            }
        }
        Ok(stats)
    }

    /// Move a pending operation to `status`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::TransitionRejected`] if the operation is missing
    /// or no longer pending.
    pub(crate) fn mark(&self, id: i64, status: OperationStatus, error: Option<&str>) -> LogResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE operations SET status = ?1, error = ?2 WHERE id = ?3 AND status = 'pending'",
            params![status.as_str(), error, id],
        )?;
        if changed == 0 {
            return Err(LogError::TransitionRejected { id });
        }
        log::debug!("Operation {} marked {}", id, status);
        Ok(())
    }
}

fn path_text(path: &Path) -> LogResult<&str> {
    path.to_str()
        .ok_or_else(|| LogError::NonUtf8Path(path.to_path_buf()))
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Columns of one row as stored.
struct RawOperation {
    id: i64,
    kind: String,
    source: String,
    destination: Option<String>,
    timestamp: String,
    status: String,
    batch: Option<String>,
    dest_size: Option<i64>,
    dest_mtime_secs: Option<i64>,
    dest_mtime_nanos: Option<i64>,
    dest_hash: Option<String>,
    error: Option<String>,
}

impl RawOperation {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            source: row.get(2)?,
            destination: row.get(3)?,
            timestamp: row.get(4)?,
            status: row.get(5)?,
            batch: row.get(6)?,
            dest_size: row.get(7)?,
            dest_mtime_secs: row.get(8)?,
            dest_mtime_nanos: row.get(9)?,
            dest_hash: row.get(10)?,
            error: row.get(11)?,
        })
    }

    fn into_operation(self) -> LogResult<Operation> {
        let id = self.id;
        let invalid = |reason: String| LogError::InvalidRow { id, reason };

        let kind: OperationKind = self.kind.parse().map_err(invalid)?;
        let status: OperationStatus = self.status.parse().map_err(invalid)?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| invalid(format!("bad timestamp: {e}")))?
            .with_timezone(&Utc);

        let fingerprint = match (self.dest_size, self.dest_mtime_secs, self.dest_mtime_nanos) {
            (Some(size), Some(secs), Some(nanos)) => {
                let size = u64::try_from(size).map_err(|_| invalid(format!("bad size {size}")))?;
                let nanos = u32::try_from(nanos)
                    .ok()
                    .filter(|n| *n < 1_000_000_000)
                    .ok_or_else(|| invalid(format!("bad nanoseconds {nanos}")))?;
                let hash = match self.dest_hash {
                    Some(hex) => Some(hex_to_hash(&hex).ok_or_else(|| invalid("bad hash".to_string()))?),
                    None => None,
                };
                Some(FileFingerprint {
                    size,
                    modified_at: join_time(secs, nanos),
                    hash,
                })
            }
            (None, None, None) => None,
            _ => return Err(invalid("partial fingerprint".to_string())),
        };

        Ok(Operation {
            id,
            kind,
            source: PathBuf::from(self.source),
            destination: self.destination.map(PathBuf::from),
            timestamp,
            status,
            batch: self.batch,
            fingerprint,
            error: self.error,
        })
    }
}
