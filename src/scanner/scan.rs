//! Incremental scanning backed by the scan cache.
//!
//! # Overview
//!
//! [`Scanner::scan`] consults the [`CacheStore`] before touching the tree.
//! A cache whose recorded modification times all still match is returned
//! verbatim, hashes included. Otherwise the tree is walked again, hashes are
//! carried over for files whose size and modification time did not change,
//! and the fresh result replaces the cache wholesale.
//!
//! Content hashes are not computed here; [`hash_records`] runs them on a
//! bounded pool when a caller needs them, and [`Scanner::persist`] writes the
//! hashed records back so the next run can skip the work.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use rayon::prelude::*;

use super::path_utils::relative_key;
use super::{FileRecord, Hash, HashError, Hasher, ScanError, ScanOptions, WalkEntry, Walker};
use crate::cache::{CacheError, CacheStore, ScanCache, Staleness};

/// Result of scanning one root directory.
#[derive(Debug)]
pub struct ScanResult {
    /// Canonical root that was scanned
    pub root: PathBuf,
    /// Captured files, sorted by path
    pub records: Vec<FileRecord>,
    /// Number of entries skipped because of an error
    pub error_count: usize,
    /// The skipped entries' errors
    pub errors: Vec<ScanError>,
    /// Wall-clock time spent
    pub duration: Duration,
    /// Whether the records were reused from a valid cache
    pub from_cache: bool,
    /// Whether the walk was stopped early by the shutdown flag
    pub interrupted: bool,
    /// Modification times of walked directories, keyed by relative path
    pub directories: BTreeMap<String, SystemTime>,
    /// Modification time of the root at scan start
    pub root_modified: SystemTime,
}

impl ScanResult {
    /// Replace the records, e.g. with copies carrying content hashes.
    ///
    /// Records are re-sorted by path.
    #[must_use]
    pub fn with_records(mut self, mut records: Vec<FileRecord>) -> Self {
        records.sort_by(|a, b| a.path.cmp(&b.path));
        self.records = records;
        self
    }

    /// Total size of all captured files.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.records.iter().map(|r| r.size).sum()
    }

    /// Number of records that already carry a content hash.
    #[must_use]
    pub fn hashed_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.content_hash.is_some())
            .count()
    }
}

/// Directory scanner with an optional incremental cache.
#[derive(Debug, Clone)]
pub struct Scanner {
    options: ScanOptions,
    cache: Option<CacheStore>,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Scanner {
    /// Create a scanner without a cache store.
    #[must_use]
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            cache: None,
            shutdown_flag: None,
        }
    }

    /// Attach the cache store consulted when `use_cache` is enabled.
    #[must_use]
    pub fn with_cache(mut self, store: CacheStore) -> Self {
        self.cache = Some(store);
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Options this scanner was built with.
    #[must_use]
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn active_cache(&self) -> Option<&CacheStore> {
        self.cache.as_ref().filter(|_| self.options.use_cache)
    }

    /// Scan `root`, reusing or refreshing the cache.
    ///
    /// # Errors
    ///
    /// Only a root that is missing, unreadable or not a directory is an
    /// error. Problems with individual entries are collected in
    /// [`ScanResult::errors`], and cache problems are logged and ignored.
    pub fn scan(&self, root: &Path) -> Result<ScanResult, ScanError> {
        let start = Instant::now();
        let root = validate_root(root)?;
        let root_modified = fs::metadata(&root)
            .and_then(|m| m.modified())
            .map_err(|e| ScanError::from_io(&root, e))?;

        let previous = self.active_cache().and_then(|store| store.load(&root));

        let scope = self.options.scope();
        if let Some(cache) = &previous {
            match cache.check_for(&scope) {
                Staleness::Fresh => {
                    log::info!(
                        "Using cached scan of {} ({} files)",
                        root.display(),
                        cache.len()
                    );
                    return Ok(ScanResult {
                        root,
                        records: cache.records(),
                        error_count: 0,
                        errors: Vec::new(),
                        duration: start.elapsed(),
                        from_cache: true,
                        interrupted: false,
                        directories: cache.directories.clone(),
                        root_modified: cache.root_snapshot_time,
                    });
                }
                reason => log::debug!("Cache for {} is stale: {:?}", root.display(), reason),
            }
        }

        let mut walker = Walker::new(&root, self.options.clone());
        if let Some(flag) = &self.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }

        let mut records = Vec::new();
        let mut directories = BTreeMap::new();
        let mut errors = Vec::new();

        for entry in walker.walk() {
            match entry {
                Ok(WalkEntry::File(record)) => records.push(record),
                Ok(WalkEntry::Directory { path, modified_at }) => {
                    if let Some(key) = relative_key(&root, &path) {
                        directories.insert(key, modified_at);
                    }
                }
                Err(e) => {
                    log::warn!("Skipping: {}", e);
                    errors.push(e);
                }
            }
        }

        let interrupted = self.is_shutdown_requested();

        if let Some(cache) = &previous {
            let mut carried = 0usize;
            for record in &mut records {
                if let Some(hash) = cache.reusable_hash(record) {
                    *record = record.with_hash(hash);
                    carried += 1;
                }
            }
            log::debug!("Carried over {} hash(es) from previous cache", carried);
        }

        records.sort_by(|a, b| a.path.cmp(&b.path));

        let result = ScanResult {
            root,
            records,
            error_count: errors.len(),
            errors,
            duration: start.elapsed(),
            from_cache: false,
            interrupted,
            directories,
            root_modified,
        };

        log::info!(
            "Scanned {}: {} files, {} errors in {:.2?}",
            result.root.display(),
            result.records.len(),
            result.error_count,
            result.duration
        );

        if let Err(e) = self.persist(&result) {
            log::warn!("Failed to save scan cache: {}", e);
        }

        Ok(result)
    }

    /// Write `result` to the cache store, replacing the previous cache.
    ///
    /// Returns `Ok(false)` without writing when caching is disabled, the
    /// scan was interrupted, or two files map to the same cache key. In the
    /// last case any previous cache for the root is removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the cache file cannot be written.
    pub fn persist(&self, result: &ScanResult) -> Result<bool, CacheError> {
        let Some(store) = self.active_cache() else {
            return Ok(false);
        };
        if result.interrupted {
            log::debug!("Not caching interrupted scan of {}", result.root.display());
            return Ok(false);
        }

        let cache = ScanCache::new(
            result.root.clone(),
            self.options.scope(),
            result.root_modified,
            result.directories.clone(),
            &result.records,
        );
        if cache.len() != result.records.len() {
            // Names differing only in Unicode form, or in bytes that are
            // not valid UTF-8, share a key.
            log::warn!(
                "Not caching scan of {}: {} file(s) have no distinct cache key",
                result.root.display(),
                result.records.len() - cache.len()
            );
            store.invalidate(&result.root)?;
            return Ok(false);
        }
        store.save(&result.root, &cache)?;
        Ok(true)
    }
}

fn validate_root(root: &Path) -> Result<PathBuf, ScanError> {
    let canonical = fs::canonicalize(root).map_err(|e| ScanError::from_io(root, e))?;
    let metadata = fs::metadata(&canonical).map_err(|e| ScanError::from_io(&canonical, e))?;
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory(canonical));
    }
    Ok(canonical)
}

/// Hash every record on a pool of at most `threads` workers.
///
/// Results are returned in input order. Records that already carry a hash
/// are not read again.
#[must_use]
pub fn hash_records(
    records: &[FileRecord],
    hasher: &Hasher,
    threads: usize,
) -> Vec<Result<Hash, HashError>> {
    let hash_one = |record: &FileRecord| match record.content_hash {
        Some(hash) => Ok(hash),
        None => hasher.full_hash(&record.path),
    };

    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
    {
        Ok(pool) => pool.install(|| records.par_iter().map(hash_one).collect()),
        Err(e) => {
            log::warn!("Failed to create hashing pool, hashing sequentially: {}", e);
            records.iter().map(hash_one).collect()
        }
    }
}
