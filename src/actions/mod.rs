//! File actions module.
//!
//! This module performs the filesystem mutations the command layer needs
//! and records each one in the [`crate::oplog::OperationLog`]:
//! - Move (undoable by moving back)
//! - Copy (undoable by deleting the copy)
//! - Permanent delete (recorded, never undoable)
//!
//! ```no_run
//! use fileorg::actions::{move_file, unique_destination};
//! use fileorg::oplog::OperationLog;
//! use std::path::Path;
//!
//! let log = OperationLog::open(Path::new("/tmp/fileorg/operations.db")).unwrap();
//! let dest = unique_destination(Path::new("/dup"), "a.txt".as_ref());
//! let op = move_file(&log, Path::new("/src/a.txt"), &dest, Some("cleanup")).unwrap();
//! println!("{}", op);
//! ```

pub mod transfer;

pub(crate) use transfer::relocate;
pub use transfer::{
    copy_file, delete_file, move_file, move_verified, unique_destination, validate_preserves_copy,
    verify_unchanged, TransferError,
};
