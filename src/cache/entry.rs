//! Cache entry definitions and staleness checks.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scanner::path_utils::relative_key;
use crate::scanner::path_utils::serde_path;
use crate::scanner::{FileRecord, Hash, ScanScope};

/// Current version of the cache file format.
pub const CACHE_VERSION: u32 = 2;

/// Persisted result of one scan of a root directory.
///
/// A cache is built once from a completed scan and replaced wholesale by the
/// next scan that detects a change; it is never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCache {
    /// Canonical root directory that was scanned.
    #[serde(with = "serde_path")]
    pub root_path: PathBuf,
    /// Walk filters the scan ran with.
    pub scope: ScanScope,
    /// Modification time of the root directory at scan time.
    pub root_snapshot_time: SystemTime,
    /// When the cache was built.
    pub built_at: DateTime<Utc>,
    /// Modification times of every walked directory below the root, keyed by relative path.
    #[serde(default)]
    pub directories: BTreeMap<String, SystemTime>,
    /// Captured files keyed by relative path.
    pub entries: BTreeMap<String, FileRecord>,
}

/// Outcome of validating a cache against the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    /// Every recorded modification time still matches.
    Fresh,
    /// The root directory can no longer be read.
    RootMissing,
    /// The cache was built with different walk filters.
    ScopeChanged,
    /// The root directory's own modification time changed.
    RootChanged,
    /// A recorded directory changed or disappeared.
    DirectoryChanged(PathBuf),
    /// A still-present file has a different modification time.
    EntryChanged(PathBuf),
}

impl Staleness {
    /// Whether the cache can be reused verbatim.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }
}

impl ScanCache {
    /// Build a cache from scan output.
    ///
    /// Records whose path does not lie under `root_path` are dropped.
    #[must_use]
    pub fn new(
        root_path: PathBuf,
        scope: ScanScope,
        root_snapshot_time: SystemTime,
        directories: BTreeMap<String, SystemTime>,
        records: &[FileRecord],
    ) -> Self {
        let mut entries = BTreeMap::new();
        for record in records {
            match relative_key(&root_path, &record.path) {
                Some(key) if !key.is_empty() => {
                    entries.insert(key, record.clone());
                }
                _ => log::warn!(
                    "Not caching {}: outside root {}",
                    record.path.display(),
                    root_path.display()
                ),
            }
        }

        Self {
            root_path,
            scope,
            root_snapshot_time,
            built_at: Utc::now(),
            directories,
            entries,
        }
    }

    /// Number of cached files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached records, sorted by path.
    #[must_use]
    pub fn records(&self) -> Vec<FileRecord> {
        let mut records: Vec<FileRecord> = self.entries.values().cloned().collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        records
    }

    /// Whether every entry lies under the root under its own key.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.entries
            .iter()
            .all(|(key, record)| relative_key(&self.root_path, &record.path).as_ref() == Some(key))
    }

    /// Previously computed hash for a file whose size and modification time are unchanged.
    #[must_use]
    pub fn reusable_hash(&self, record: &FileRecord) -> Option<Hash> {
        let key = relative_key(&self.root_path, &record.path)?;
        self.entries
            .get(&key)
            .filter(|cached| cached.same_state(record))
            .and_then(|cached| cached.content_hash)
    }

    /// Like [`ScanCache::check`], but stale first of all when `scope` differs
    /// from the one the cache was built with.
    #[must_use]
    pub fn check_for(&self, scope: &ScanScope) -> Staleness {
        if &self.scope != scope {
            return Staleness::ScopeChanged;
        }
        self.check()
    }

    /// Compare recorded modification times against the filesystem.
    ///
    /// Only metadata is read. Entries that no longer exist are skipped here;
    /// their removal shows up as a change of the containing directory.
    #[must_use]
    pub fn check(&self) -> Staleness {
        match modified(&self.root_path) {
            Some(t) if t == self.root_snapshot_time => {}
            Some(_) => return Staleness::RootChanged,
            None => return Staleness::RootMissing,
        }

        for (key, recorded) in &self.directories {
            let path = self.root_path.join(key);
            if modified(&path) != Some(*recorded) {
                return Staleness::DirectoryChanged(path);
            }
        }

        for record in self.entries.values() {
            if let Ok(metadata) = fs::metadata(&record.path) {
                if metadata.modified().ok() != Some(record.modified_at) {
                    return Staleness::EntryChanged(record.path.clone());
                }
            }
        }

        Staleness::Fresh
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::symlink_metadata(path).and_then(|m| m.modified()).ok()
}
