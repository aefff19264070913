use fileorg::actions::{move_verified, TransferError};
use fileorg::duplicates::{DuplicateError, DuplicateIndex};
use fileorg::oplog::{OperationLog, OperationStatus, UndoEngine, UndoError};
use fileorg::scanner::{HashError, ScanOptions, Scanner};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_index_continues_when_a_candidate_vanishes() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    fs::write(root.join("a.txt"), "same").unwrap();
    fs::write(root.join("b.txt"), "same").unwrap();
    fs::write(root.join("c.txt"), "same").unwrap();

    let records = Scanner::new(ScanOptions::default().with_use_cache(false))
        .scan(&root)
        .unwrap()
        .records;
    fs::remove_file(root.join("b.txt")).unwrap();

    let outcome = DuplicateIndex::new().build(&records);

    assert!(!outcome.interrupted);
    assert_eq!(outcome.errors.len(), 1);
    let DuplicateError::Hash { path, source } = &outcome.errors[0];
    assert_eq!(path, &root.join("b.txt"));
    assert!(matches!(source, HashError::NotFound(_)));

    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(
        outcome.groups[0].paths(),
        vec![root.join("a.txt"), root.join("c.txt")]
    );
    assert_eq!(outcome.stats.hash_errors, 1);
}

#[test]
fn test_stale_record_is_not_moved() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    fs::write(root.join("a.txt"), "before").unwrap();
    let records = Scanner::new(ScanOptions::default().with_use_cache(false))
        .scan(&root)
        .unwrap()
        .records;

    fs::write(root.join("a.txt"), "after, and longer").unwrap();

    let log = OperationLog::open_in_memory().unwrap();
    let err = move_verified(&log, &records[0], &root.join("moved.txt"), None).unwrap_err();

    assert!(matches!(err, TransferError::Modified(_)));
    assert!(root.join("a.txt").exists());
    assert!(!root.join("moved.txt").exists());
    assert_eq!(log.stats().unwrap().total, 0);
}

#[test]
fn test_batch_undo_continues_past_failures() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let log = OperationLog::open_in_memory().unwrap();

    for name in ["one", "two", "three"] {
        fs::write(root.join(name), name).unwrap();
        fileorg::actions::move_file(
            &log,
            &root.join(name),
            &root.join(format!("{name}.moved")),
            Some("batch"),
        )
        .unwrap();
    }

    // Block the middle one by reoccupying its source.
    fs::write(root.join("two"), "squatter").unwrap();

    let report = UndoEngine::new(&log).undo_batch("batch").unwrap();

    assert_eq!(report.undone_count(), 2);
    assert_eq!(report.failed_count(), 1);
    assert!(matches!(report.failed[0], UndoError::SourceOccupied { .. }));
    assert_eq!(fs::read_to_string(root.join("one")).unwrap(), "one");
    assert_eq!(fs::read_to_string(root.join("three")).unwrap(), "three");
    assert_eq!(fs::read_to_string(root.join("two")).unwrap(), "squatter");
    assert!(root.join("two.moved").exists());
}

#[test]
fn test_undo_reports_log_failure_after_reversal() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let db = root.join("state/operations.db");
    let log = OperationLog::open(&db).unwrap();

    fs::write(root.join("a.txt"), "alpha").unwrap();
    let op = fileorg::actions::move_file(&log, &root.join("a.txt"), &root.join("b.txt"), None)
        .unwrap();

    // A second writer makes the status update fail once the file is back.
    let other = rusqlite::Connection::open(&db).unwrap();
    other
        .execute_batch(
            "CREATE TRIGGER freeze_undone BEFORE UPDATE OF status ON operations
             WHEN NEW.status = 'undone'
             BEGIN SELECT RAISE(ABORT, 'frozen'); END;",
        )
        .unwrap();
    drop(other);

    let result = UndoEngine::new(&log).undo(op.id);

    assert!(matches!(result, Err(UndoError::Log(_))));
    assert_eq!(fs::read_to_string(root.join("a.txt")).unwrap(), "alpha");
    assert!(!root.join("b.txt").exists());
    assert_eq!(
        log.get(op.id).unwrap().unwrap().status,
        OperationStatus::Pending
    );
}
