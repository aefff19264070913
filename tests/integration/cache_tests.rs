use fileorg::cache::{CacheStore, Staleness};
use fileorg::duplicates::DuplicateIndex;
use fileorg::scanner::{ScanOptions, Scanner};
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

fn setup() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    fs::write(root.join("file1.txt"), "duplicate content").unwrap();
    fs::write(root.join("file2.txt"), "duplicate content").unwrap();
    fs::create_dir(root.join("docs")).unwrap();
    fs::write(root.join("docs/notes.md"), "notes").unwrap();
    (dir, root)
}

fn cached_scanner(state: &TempDir) -> Scanner {
    Scanner::new(ScanOptions::default()).with_cache(CacheStore::new(state.path()))
}

#[test]
fn test_cache_initial_scan_and_rescan() {
    let (_dir, root) = setup();
    let state = tempdir().unwrap();
    let scanner = cached_scanner(&state);

    let first = scanner.scan(&root).unwrap();
    assert!(!first.from_cache);
    assert!(CacheStore::new(state.path()).cache_file(&root).exists());

    let second = scanner.scan(&root).unwrap();
    assert!(second.from_cache);
    assert_eq!(first.records, second.records);
}

#[test]
fn test_cache_invalidated_by_new_file() {
    let (_dir, root) = setup();
    let state = tempdir().unwrap();
    let scanner = cached_scanner(&state);
    scanner.scan(&root).unwrap();

    fs::write(root.join("docs/added.md"), "added").unwrap();

    let check = CacheStore::new(state.path()).load(&root).unwrap().check();
    assert!(matches!(check, Staleness::DirectoryChanged(_)));

    let rescan = scanner.scan(&root).unwrap();
    assert!(!rescan.from_cache);
    assert_eq!(rescan.records.len(), 4);
}

#[test]
fn test_cache_invalidated_by_modified_file() {
    let (_dir, root) = setup();
    let state = tempdir().unwrap();
    let scanner = cached_scanner(&state);
    scanner.scan(&root).unwrap();

    set_file_mtime(root.join("file1.txt"), FileTime::from_unix_time(1_000_000, 0)).unwrap();

    let rescan = scanner.scan(&root).unwrap();
    assert!(!rescan.from_cache);
    let record = rescan
        .records
        .iter()
        .find(|r| r.path.ends_with("file1.txt"))
        .unwrap();
    assert_eq!(FileTime::from_system_time(record.modified_at).unix_seconds(), 1_000_000);
}

#[test]
fn test_deleted_file_is_not_staleness_of_its_own() {
    let (_dir, root) = setup();
    let state = tempdir().unwrap();
    let scanner = cached_scanner(&state);
    let first = scanner.scan(&root).unwrap();

    fs::remove_file(root.join("docs/notes.md")).unwrap();
    let docs_mtime = first.directories["docs"];
    set_file_mtime(root.join("docs"), FileTime::from_system_time(docs_mtime)).unwrap();

    // Every recorded directory and surviving file is unchanged.
    let cache = CacheStore::new(state.path()).load(&root).unwrap();
    assert_eq!(cache.check(), Staleness::Fresh);
}

#[test]
fn test_hashes_persist_across_runs() {
    let (_dir, root) = setup();
    let state = tempdir().unwrap();
    let scanner = cached_scanner(&state);

    let scan = scanner.scan(&root).unwrap();
    let outcome = DuplicateIndex::new().build(&scan.records);
    assert_eq!(outcome.stats.hashed_files, 2);
    let hashed = scan.with_records(outcome.records);
    assert!(scanner.persist(&hashed).unwrap());

    let again = scanner.scan(&root).unwrap();
    assert!(again.from_cache);
    assert_eq!(again.hashed_count(), 2);

    let outcome = DuplicateIndex::new().build(&again.records);
    assert_eq!(outcome.stats.hashed_files, 0);
    assert_eq!(outcome.stats.reused_hashes, 2);
    assert_eq!(outcome.groups.len(), 1);
}

#[test]
fn test_hashes_carried_over_when_stale() {
    let (_dir, root) = setup();
    let state = tempdir().unwrap();
    let scanner = cached_scanner(&state);

    let scan = scanner.scan(&root).unwrap();
    let outcome = DuplicateIndex::new().build(&scan.records);
    scanner.persist(&scan.with_records(outcome.records)).unwrap();

    fs::write(root.join("unrelated.txt"), "new").unwrap();

    let rescan = scanner.scan(&root).unwrap();
    assert!(!rescan.from_cache);
    assert_eq!(rescan.hashed_count(), 2);
    let fresh = rescan
        .records
        .iter()
        .find(|r| r.path.ends_with("unrelated.txt"))
        .unwrap();
    assert!(fresh.content_hash.is_none());
}

#[test]
fn test_disabled_cache_is_neither_read_nor_written() {
    let (_dir, root) = setup();
    let state = tempdir().unwrap();
    let scanner = Scanner::new(ScanOptions::default().with_use_cache(false))
        .with_cache(CacheStore::new(state.path()));

    scanner.scan(&root).unwrap();
    let second = scanner.scan(&root).unwrap();

    assert!(!second.from_cache);
    assert!(!CacheStore::new(state.path()).cache_file(&root).exists());
}

#[test]
fn test_invalidate_and_clear_all() {
    let (_dir, root) = setup();
    let (_other_dir, other) = setup();
    let state = tempdir().unwrap();
    let scanner = cached_scanner(&state);
    scanner.scan(&root).unwrap();
    scanner.scan(&other).unwrap();

    let store = CacheStore::new(state.path());
    assert_ne!(store.cache_file(&root), store.cache_file(&other));
    assert!(store.invalidate(&root).unwrap());
    assert!(!store.invalidate(&root).unwrap());
    assert!(store.load(&root).is_none());

    assert_eq!(store.clear_all().unwrap(), 1);
    assert!(store.load(&other).is_none());
}

#[test]
fn test_cached_scan_groups_match_uncached_scan() {
    let (_dir, root) = setup();
    fs::write(root.join("docs/copy.txt"), "duplicate content").unwrap();
    fs::write(root.join("docs/notes2.md"), "notes").unwrap();
    let state = tempdir().unwrap();
    let scanner = cached_scanner(&state);

    let scan = scanner.scan(&root).unwrap();
    let outcome = DuplicateIndex::new().build(&scan.records);
    assert!(scanner.persist(&scan.with_records(outcome.records)).unwrap());

    let cached = scanner.scan(&root).unwrap();
    assert!(cached.from_cache);

    let uncached = Scanner::new(ScanOptions::default().with_use_cache(false))
        .scan(&root)
        .unwrap();
    assert!(!uncached.from_cache);

    let from_cache = DuplicateIndex::new().build(&cached.records).groups;
    let fresh = DuplicateIndex::new().build(&uncached.records).groups;
    assert_eq!(from_cache.len(), 2);
    assert_eq!(from_cache, fresh);
}

#[test]
fn test_cache_not_reused_with_other_filters() {
    let (_dir, root) = setup();
    fs::write(root.join(".hidden.txt"), "duplicate content").unwrap();
    fs::create_dir(root.join("build")).unwrap();
    fs::write(root.join("build/out.bin"), "duplicate content").unwrap();
    let state = tempdir().unwrap();

    let wide = Scanner::new(
        ScanOptions::default()
            .with_include_hidden(true)
            .with_exclude_dirs(Vec::<String>::new()),
    )
    .with_cache(CacheStore::new(state.path()));
    let first = wide.scan(&root).unwrap();
    assert_eq!(first.records.len(), 5);
    assert!(wide.scan(&root).unwrap().from_cache);

    let narrow = Scanner::new(ScanOptions::default().with_exclude_dirs(["build"]))
        .with_cache(CacheStore::new(state.path()));
    let second = narrow.scan(&root).unwrap();
    assert!(!second.from_cache);
    let paths: Vec<PathBuf> = second.records.iter().map(|r| r.path.clone()).collect();
    assert_eq!(
        paths,
        vec![
            root.join("docs/notes.md"),
            root.join("file1.txt"),
            root.join("file2.txt"),
        ]
    );

    // The narrow scan replaced the cache, so the wide one walks again.
    assert!(narrow.scan(&root).unwrap().from_cache);
    assert!(!wide.scan(&root).unwrap().from_cache);

    let uncached = Scanner::new(
        ScanOptions::default()
            .with_exclude_dirs(["build"])
            .with_use_cache(false),
    )
    .scan(&root)
    .unwrap();
    assert_eq!(
        DuplicateIndex::new().build(&second.records).groups,
        DuplicateIndex::new().build(&uncached.records).groups
    );
}
