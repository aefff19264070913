use fileorg::duplicates::{candidates, find_duplicates, keep, DuplicateIndex, KeepStrategy};
use fileorg::scanner::{ScanOptions, Scanner};
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn write(root: &Path, rel: &str, content: &str, mtime: i64) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
    path
}

/// Three copies of one file at different depths and ages, plus noise.
fn setup() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root, "photos/2020/img.jpg", "jpeg bytes", 1_600_000_000);
    write(&root, "img.jpg", "jpeg bytes", 1_500_000_000);
    write(&root, "backup/img-copy.jpg", "jpeg bytes", 1_700_000_000);
    write(&root, "other.jpg", "different!", 1_600_000_000);
    write(&root, "empty1", "", 1_600_000_000);
    write(&root, "empty2", "", 1_600_000_000);
    (dir, root)
}

fn scan(root: &Path) -> Vec<fileorg::scanner::FileRecord> {
    Scanner::new(ScanOptions::default().with_use_cache(false))
        .scan(root)
        .unwrap()
        .records
}

#[test]
fn test_groups_exclude_empty_and_unique_files() {
    let (_dir, root) = setup();
    let outcome = DuplicateIndex::new().build(&scan(&root));

    assert_eq!(outcome.groups.len(), 1);
    let group = &outcome.groups[0];
    assert_eq!(group.len(), 3);
    assert_eq!(group.size, 10);
    assert_eq!(group.wasted_space(), 20);
    assert_eq!(outcome.stats.grouping.empty_files, 2);
    // "other.jpg" shares the size and is hashed, but has no partner.
    assert_eq!(outcome.stats.hashed_files, 4);
    assert_eq!(outcome.stats.duplicate_files, 2);
    assert!(outcome.errors.is_empty());
}

#[test]
fn test_keep_strategies() {
    let (_dir, root) = setup();
    let outcome = DuplicateIndex::new().build(&scan(&root));
    let group = &outcome.groups[0];

    let kept = |s| keep(group, s).unwrap().path.clone();
    assert_eq!(kept(KeepStrategy::Newest), root.join("backup/img-copy.jpg"));
    assert_eq!(kept(KeepStrategy::Oldest), root.join("img.jpg"));
    assert_eq!(kept(KeepStrategy::ShortestPath), root.join("img.jpg"));
    // Records are sorted by path, so "backup/..." comes first.
    assert_eq!(kept(KeepStrategy::First), root.join("backup/img-copy.jpg"));
}

#[test]
fn test_candidates_exclude_keeper() {
    let (_dir, root) = setup();
    let outcome = DuplicateIndex::new().build(&scan(&root));
    let group = &outcome.groups[0];

    for strategy in [
        KeepStrategy::Newest,
        KeepStrategy::Oldest,
        KeepStrategy::ShortestPath,
        KeepStrategy::First,
    ] {
        let keeper = keep(group, strategy).unwrap();
        let rest = candidates(group, strategy);
        assert_eq!(rest.len(), 2);
        assert!(rest.iter().all(|c| c.path != keeper.path));
    }
}

#[test]
fn test_newest_tie_prefers_shorter_path() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root, "deeper/name.txt", "same", 1_600_000_000);
    write(&root, "name.txt", "same", 1_600_000_000);

    let outcome = DuplicateIndex::new().build(&scan(&root));
    let kept = keep(&outcome.groups[0], KeepStrategy::Newest).unwrap();

    assert_eq!(kept.path, root.join("name.txt"));
}

#[test]
fn test_build_is_deterministic() {
    let (_dir, root) = setup();
    let records = scan(&root);

    let first = DuplicateIndex::new().with_hash_threads(1).build(&records);
    let second = DuplicateIndex::new().with_hash_threads(8).build(&records);

    assert_eq!(first.groups, second.groups);
    assert_eq!(first.records, second.records);
}

#[test]
fn test_find_duplicates_on_hashed_records() {
    let (_dir, root) = setup();
    let outcome = DuplicateIndex::new().build(&scan(&root));

    let selections = find_duplicates(&outcome.records, KeepStrategy::Oldest);

    assert_eq!(selections.len(), 1);
    assert_eq!(selections[0].keeper.path, root.join("img.jpg"));
    assert_eq!(selections[0].candidates.len(), 2);
}

#[test]
fn test_find_duplicates_ignores_unhashed_records() {
    let (_dir, root) = setup();
    assert!(find_duplicates(&scan(&root), KeepStrategy::Newest).is_empty());
}
