//! Operation log and undo.
//!
//! Every filesystem mutation performed by the command layer is appended to
//! the [`OperationLog`], the single source of truth for undo. Operations are
//! never removed; only their status changes, once, from `pending` to either
//! `undone` or `failed`.
//!
//! # Example
//!
//! ```no_run
//! use fileorg::oplog::{OperationKind, OperationLog, UndoEngine};
//! use std::path::Path;
//!
//! let log = OperationLog::open(Path::new("/tmp/fileorg/operations.db")).unwrap();
//! std::fs::rename("/src/a.txt", "/dup/a.txt").unwrap();
//! let op = log
//!     .record(OperationKind::Move, Path::new("/src/a.txt"), Some(Path::new("/dup/a.txt")))
//!     .unwrap();
//!
//! UndoEngine::new(&log).undo(op.id).unwrap();
//! ```

pub mod operation;
pub mod store;
pub mod undo;

pub use operation::{FileFingerprint, Operation, OperationKind, OperationStatus};
pub use store::{LogError, LogResult, LogStats, OperationLog, SCHEMA_VERSION};
pub use undo::{UndoEngine, UndoError, UndoReport};
