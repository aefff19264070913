use fileorg::actions::{copy_file, delete_file, move_file};
use fileorg::oplog::{OperationLog, OperationStatus, UndoEngine, UndoError};
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

struct Env {
    dir: TempDir,
    log: OperationLog,
}

impl Env {
    fn new() -> Self {
        Self {
            dir: tempdir().unwrap(),
            log: OperationLog::open_in_memory().unwrap(),
        }
    }

    fn file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn engine(&self) -> UndoEngine<'_> {
        UndoEngine::new(&self.log)
    }
}

fn status(log: &OperationLog, id: i64) -> OperationStatus {
    log.get(id).unwrap().unwrap().status
}

#[test]
fn test_undo_move_restores_source() {
    let env = Env::new();
    let src = env.file("report.pdf", "pdf");
    let dst = env.path("archive/2024/report.pdf");
    let op = move_file(&env.log, &src, &dst, None).unwrap();

    let undone = env.engine().undo(op.id).unwrap();

    assert_eq!(undone.status, OperationStatus::Undone);
    assert_eq!(fs::read_to_string(&src).unwrap(), "pdf");
    assert!(!dst.exists());
    assert_eq!(status(&env.log, op.id), OperationStatus::Undone);
}

#[test]
fn test_undo_copy_removes_destination_only() {
    let env = Env::new();
    let src = env.file("a.txt", "alpha");
    let dst = env.path("copies/a.txt");
    let op = copy_file(&env.log, &src, &dst, None).unwrap();

    env.engine().undo(op.id).unwrap();

    assert!(src.exists());
    assert!(!dst.exists());
}

#[test]
fn test_undo_copy_with_missing_destination_succeeds() {
    let env = Env::new();
    let src = env.file("a.txt", "alpha");
    let dst = env.path("a.copy");
    let op = copy_file(&env.log, &src, &dst, None).unwrap();
    fs::remove_file(&dst).unwrap();

    let undone = env.engine().undo(op.id).unwrap();

    assert_eq!(undone.status, OperationStatus::Undone);
}

#[test]
fn test_undo_twice_is_not_undoable() {
    let env = Env::new();
    let op = move_file(&env.log, &env.file("a", "a"), &env.path("b"), None).unwrap();
    env.engine().undo(op.id).unwrap();

    let err = env.engine().undo(op.id).unwrap_err();

    assert!(matches!(err, UndoError::NotUndoable { id, .. } if id == op.id));
}

#[test]
fn test_undo_unknown_id() {
    let env = Env::new();
    assert!(matches!(env.engine().undo(42), Err(UndoError::NotFound(42))));
}

#[test]
fn test_delete_is_never_undoable() {
    let env = Env::new();
    let op = delete_file(&env.log, &env.file("gone", "x"), None).unwrap();

    let err = env.engine().undo(op.id).unwrap_err();

    assert!(matches!(err, UndoError::NotUndoable { .. }));
    assert_eq!(status(&env.log, op.id), OperationStatus::Pending);
}

#[test]
fn test_modified_destination_blocks_undo() {
    let env = Env::new();
    let src = env.file("notes.txt", "v1");
    let dst = env.path("moved.txt");
    let op = move_file(&env.log, &src, &dst, None).unwrap();

    fs::write(&dst, "v2 with edits").unwrap();

    let err = env.engine().undo(op.id).unwrap_err();
    assert!(matches!(err, UndoError::DestinationModified { .. }));
    assert!(!src.exists());
    assert_eq!(fs::read_to_string(&dst).unwrap(), "v2 with edits");
    assert_eq!(status(&env.log, op.id), OperationStatus::Pending);
}

#[test]
fn test_touched_destination_blocks_undo() {
    let env = Env::new();
    let dst = env.path("moved.txt");
    let op = move_file(&env.log, &env.file("notes.txt", "v1"), &dst, None).unwrap();

    set_file_mtime(&dst, FileTime::from_unix_time(1_000, 0)).unwrap();

    assert!(matches!(
        env.engine().check(op.id),
        Err(UndoError::DestinationModified { .. })
    ));
}

#[test]
fn test_content_fingerprint_catches_same_size_edit() {
    let dir = tempdir().unwrap();
    let log = OperationLog::open_in_memory()
        .unwrap()
        .with_content_fingerprints(true);
    let src = dir.path().join("a.txt");
    let dst = dir.path().join("b.txt");
    fs::write(&src, "aaaa").unwrap();
    let op = move_file(&log, &src, &dst, None).unwrap();
    assert!(op.fingerprint.unwrap().hash.is_some());

    let recorded = fs::metadata(&dst).unwrap().modified().unwrap();
    fs::write(&dst, "bbbb").unwrap();
    set_file_mtime(&dst, FileTime::from_system_time(recorded)).unwrap();

    assert!(matches!(
        UndoEngine::new(&log).undo(op.id),
        Err(UndoError::DestinationModified { .. })
    ));
}

#[test]
fn test_occupied_source_blocks_undo() {
    let env = Env::new();
    let src = env.file("a.txt", "original");
    let dst = env.path("b.txt");
    let op = move_file(&env.log, &src, &dst, None).unwrap();
    fs::write(&src, "newcomer").unwrap();

    let err = env.engine().undo(op.id).unwrap_err();

    assert!(matches!(err, UndoError::SourceOccupied { ref path, .. } if path == &src));
    assert_eq!(fs::read_to_string(&src).unwrap(), "newcomer");
    assert_eq!(fs::read_to_string(&dst).unwrap(), "original");
}

#[test]
fn test_missing_move_destination() {
    let env = Env::new();
    let dst = env.path("b.txt");
    let op = move_file(&env.log, &env.file("a.txt", "a"), &dst, None).unwrap();
    fs::remove_file(&dst).unwrap();

    assert!(matches!(
        env.engine().undo(op.id),
        Err(UndoError::DestinationMissing { .. })
    ));
}

#[test]
fn test_failed_reversal_is_terminal() {
    let env = Env::new();
    let src_dir = env.path("inbox");
    fs::create_dir(&src_dir).unwrap();
    let src = src_dir.join("a.txt");
    fs::write(&src, "a").unwrap();
    let op = move_file(&env.log, &src, &env.path("a.txt"), None).unwrap();

    // The source's parent is now a file, so the move back cannot happen.
    fs::remove_dir(&src_dir).unwrap();
    fs::write(&src_dir, "not a directory").unwrap();

    let err = env.engine().undo(op.id).unwrap_err();
    assert!(matches!(err, UndoError::ReversalFailed { .. }));

    let stored = env.log.get(op.id).unwrap().unwrap();
    assert_eq!(stored.status, OperationStatus::Failed);
    assert!(stored.error.is_some());
    assert!(matches!(
        env.engine().undo(op.id),
        Err(UndoError::NotUndoable { .. })
    ));
    assert!(env.log.list_undoable(10).unwrap().is_empty());
}

#[test]
fn test_check_has_no_side_effects() {
    let env = Env::new();
    let src = env.file("a.txt", "a");
    let dst = env.path("b.txt");
    let op = move_file(&env.log, &src, &dst, None).unwrap();

    let checked = env.engine().check(op.id).unwrap();

    assert_eq!(checked.status, OperationStatus::Pending);
    assert!(dst.exists());
    assert!(!src.exists());
    assert_eq!(status(&env.log, op.id), OperationStatus::Pending);
}
