use fileorg::actions::move_file;
use fileorg::cache::CacheStore;
use fileorg::duplicates::DuplicateIndex;
use fileorg::oplog::{OperationLog, UndoEngine};
use fileorg::scanner::{ScanOptions, Scanner};
use std::fs;
use tempfile::tempdir;

fn cached_scanner(state: &std::path::Path) -> Scanner {
    Scanner::new(ScanOptions::default()).with_cache(CacheStore::new(state))
}

#[test]
fn test_special_names_survive_cache_round_trip() {
    let dir = tempdir().unwrap();
    let state = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();

    let mut names = vec!["file with spaces.txt", "café_🦀.txt", "special_!@#$%^&()_+.txt"];
    // Windows does not allow these characters in filenames.
    if cfg!(not(windows)) {
        names.push("quote_\"name\".txt");
        names.push("new\nline.txt");
    }
    for name in &names {
        fs::write(root.join(name), "content").unwrap();
    }

    let scanner = cached_scanner(state.path());
    let first = scanner.scan(&root).unwrap();
    let second = scanner.scan(&root).unwrap();

    assert!(second.from_cache);
    assert_eq!(second.records.len(), names.len());
    assert_eq!(first.records, second.records);

    let outcome = DuplicateIndex::new().build(&second.records);
    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(outcome.groups[0].len(), names.len());
}

#[test]
fn test_extremely_long_paths() {
    let dir = tempdir().unwrap();
    let state = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();

    let mut current = root.clone();
    let folder_name = "a".repeat(50);
    // 6 levels of 50-char folders = 300+ chars.
    for i in 0..6 {
        current = current.join(format!("{}_{}", i, folder_name));
        if let Err(e) = fs::create_dir(&current) {
            eprintln!("Skipping extremely long path test: failed to create dir: {}", e);
            return;
        }
    }
    fs::write(current.join("file.txt"), "content").unwrap();
    fs::write(root.join("duplicate.txt"), "content").unwrap();

    let scanner = cached_scanner(state.path());
    scanner.scan(&root).unwrap();
    let cached = scanner.scan(&root).unwrap();

    assert!(cached.from_cache);
    assert_eq!(DuplicateIndex::new().build(&cached.records).groups.len(), 1);
}

#[test]
fn test_unicode_forms_are_not_merged() {
    let dir = tempdir().unwrap();
    let state = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();

    fs::write(root.join("café.txt"), "content").unwrap();
    fs::write(root.join("cafe\u{0301}.txt"), "content").unwrap();
    let on_disk = fs::read_dir(&root).unwrap().count();

    let scanner = cached_scanner(state.path());
    scanner.scan(&root).unwrap();
    let again = scanner.scan(&root).unwrap();

    // Filesystems that normalize names hold a single file; others hold two,
    // and both must keep showing up even though they share a cache key.
    assert_eq!(again.records.len(), on_disk);
    if on_disk == 2 {
        assert!(!again.from_cache);
    }
}

#[test]
fn test_undo_move_of_unicode_name() {
    let dir = tempdir().unwrap();
    let log = OperationLog::open_in_memory().unwrap();
    let src = dir.path().join("résumé 2024.pdf");
    let dst = dir.path().join("архив").join("résumé 2024.pdf");
    fs::write(&src, "pdf").unwrap();

    let op = move_file(&log, &src, &dst, None).unwrap();
    let stored = log.get(op.id).unwrap().unwrap();
    assert_eq!(stored.source, src);
    assert_eq!(stored.destination.as_deref(), Some(dst.as_path()));

    UndoEngine::new(&log).undo(op.id).unwrap();
    assert!(src.exists());
}

#[cfg(unix)]
#[test]
fn test_non_utf8_name_is_cached() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir().unwrap();
    let state = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();

    let bad = root.join(OsStr::from_bytes(b"bad\xff.txt"));
    if let Err(e) = fs::write(&bad, "content") {
        eprintln!("Skipping non-UTF-8 name test: filesystem refused the name: {}", e);
        return;
    }
    fs::write(root.join("a.txt"), "content").unwrap();

    let scanner = cached_scanner(state.path());
    let first = scanner.scan(&root).unwrap();
    assert_eq!(first.records.len(), 2);
    assert!(CacheStore::new(state.path()).cache_file(&root).exists());

    let second = scanner.scan(&root).unwrap();
    assert!(second.from_cache);
    assert_eq!(first.records, second.records);
    assert!(second.records.iter().any(|r| r.path == bad));

    let outcome = DuplicateIndex::new().build(&second.records);
    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(outcome.groups[0].len(), 2);
}
