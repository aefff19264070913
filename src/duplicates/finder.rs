//! Content-based duplicate index.
//!
//! # Overview
//!
//! [`DuplicateIndex::build`] runs the two-phase pipeline over scanned records:
//!
//! 1. **Size** - bucket records by exact size, dropping singletons and empty files
//! 2. **Content** - hash the remaining candidates on a bounded pool and group
//!    them by digest
//!
//! Hashes already present on a record (from the scan cache) are reused
//! without reading the file. A candidate that cannot be hashed is left out of
//! its bucket and reported in [`IndexOutcome::errors`]; the rest of the index
//! is still built.
//!
//! # Example
//!
//! ```no_run
//! use fileorg::duplicates::DuplicateIndex;
//! use fileorg::scanner::{ScanOptions, Scanner};
//! use std::path::Path;
//!
//! let scan = Scanner::new(ScanOptions::default()).scan(Path::new(".")).unwrap();
//! let outcome = DuplicateIndex::new().build(&scan.records);
//!
//! println!("{} groups, {} bytes wasted", outcome.groups.len(), outcome.stats.wasted_space);
//! ```

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use super::groups::{group_by_size, DuplicateGroup, GroupingStats, SizeBucket};
use crate::scanner::{hash_records, FileRecord, Hash, HashError, Hasher};

/// Error raised for one candidate file during index construction.
#[derive(Debug, Error)]
pub enum DuplicateError {
    /// The candidate could not be hashed and was excluded from its bucket.
    #[error("Failed to hash candidate {path}: {source}")]
    Hash {
        /// Candidate that was excluded
        path: PathBuf,
        /// Underlying hashing error
        #[source]
        source: HashError,
    },
}

impl DuplicateError {
    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Hash { path, .. } => path,
        }
    }
}

/// Statistics from building the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Size phase statistics
    pub grouping: GroupingStats,
    /// Candidates whose content was read and hashed
    pub hashed_files: usize,
    /// Candidates whose hash was reused from the record
    pub reused_hashes: usize,
    /// Candidates excluded because hashing failed
    pub hash_errors: usize,
    /// Number of duplicate groups
    pub duplicate_groups: usize,
    /// Files in duplicate groups beyond the first of each group
    pub duplicate_files: usize,
    /// Bytes taken by those extra copies
    pub wasted_space: u64,
}

/// Output of [`DuplicateIndex::build`].
#[derive(Debug)]
pub struct IndexOutcome {
    /// Duplicate groups, ordered by the input position of their first member
    pub groups: Vec<DuplicateGroup>,
    /// The input records, in input order, with newly computed hashes attached
    pub records: Vec<FileRecord>,
    /// Candidates that could not be hashed
    pub errors: Vec<DuplicateError>,
    /// Build statistics
    pub stats: IndexStats,
    /// Whether hashing was stopped by the shutdown flag
    pub interrupted: bool,
}

/// Builds duplicate groups from scanned records.
#[derive(Debug, Clone)]
pub struct DuplicateIndex {
    hash_threads: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for DuplicateIndex {
    fn default() -> Self {
        Self {
            hash_threads: 4,
            shutdown_flag: None,
        }
    }
}

impl DuplicateIndex {
    /// Create an index builder with four hashing threads.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of hashing threads (at least one).
    #[must_use]
    pub fn with_hash_threads(mut self, threads: usize) -> Self {
        self.hash_threads = threads.max(1);
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Build duplicate groups from `records`.
    ///
    /// The result depends only on the records and the file contents: running
    /// it twice over an unchanged tree yields identical groups.
    #[must_use]
    pub fn build(&self, records: &[FileRecord]) -> IndexOutcome {
        let (buckets, grouping) = group_by_size(records);
        let mut stats = IndexStats {
            grouping,
            ..IndexStats::default()
        };

        let candidates: Vec<usize> = buckets
            .iter()
            .flat_map(|b| b.indices.iter().copied())
            .collect();
        let to_hash: Vec<FileRecord> = candidates.iter().map(|&i| records[i].clone()).collect();

        let mut hasher = Hasher::new();
        if let Some(flag) = &self.shutdown_flag {
            hasher = hasher.with_shutdown_flag(Arc::clone(flag));
        }

        log::info!("Hashing {} candidate file(s)", to_hash.len());
        let results = hash_records(&to_hash, &hasher, self.hash_threads);

        let mut hashed = records.to_vec();
        let mut errors = Vec::new();
        let mut interrupted = false;

        for (&idx, result) in candidates.iter().zip(results) {
            match result {
                Ok(hash) if records[idx].content_hash.is_some() => {
                    debug_assert_eq!(records[idx].content_hash, Some(hash));
                    stats.reused_hashes += 1;
                }
                Ok(hash) => {
                    hashed[idx] = records[idx].with_hash(hash);
                    stats.hashed_files += 1;
                }
                Err(e) if is_interrupted(&e) => interrupted = true,
                Err(source) => {
                    log::warn!("Excluding {}: {}", records[idx].path.display(), source);
                    stats.hash_errors += 1;
                    errors.push(DuplicateError::Hash {
                        path: records[idx].path.clone(),
                        source,
                    });
                }
            }
        }

        interrupted |= self.is_shutdown_requested();

        let groups = groups_from_buckets(&hashed, &buckets);

        stats.duplicate_groups = groups.len();
        stats.duplicate_files = groups.iter().map(DuplicateGroup::duplicate_count).sum();
        stats.wasted_space = groups.iter().map(DuplicateGroup::wasted_space).sum();

        log::info!(
            "Found {} duplicate group(s), {} redundant file(s), {} byte(s) reclaimable",
            stats.duplicate_groups,
            stats.duplicate_files,
            stats.wasted_space
        );

        IndexOutcome {
            groups,
            records: hashed,
            errors,
            stats,
            interrupted,
        }
    }
}

fn is_interrupted(error: &HashError) -> bool {
    matches!(error, HashError::Io { source, .. } if source.kind() == io::ErrorKind::Interrupted)
}

/// Group records that already carry a content hash. Performs no I/O.
///
/// Records without a hash are ignored.
#[must_use]
pub fn group_hashed(records: &[FileRecord]) -> Vec<DuplicateGroup> {
    let (buckets, _) = group_by_size(records);
    groups_from_buckets(records, &buckets)
}

fn groups_from_buckets(records: &[FileRecord], buckets: &[SizeBucket]) -> Vec<DuplicateGroup> {
    // (first input position, group)
    let mut groups: Vec<(usize, DuplicateGroup)> = Vec::new();

    for bucket in buckets {
        let mut slots: HashMap<Hash, usize> = HashMap::new();
        let mut by_hash: Vec<(Hash, Vec<usize>)> = Vec::new();

        for &idx in &bucket.indices {
            let Some(hash) = records[idx].content_hash else {
                continue;
            };
            let slot = *slots.entry(hash).or_insert_with(|| {
                by_hash.push((hash, Vec::new()));
                by_hash.len() - 1
            });
            by_hash[slot].1.push(idx);
        }

        for (hash, indices) in by_hash {
            if indices.len() < 2 {
                continue;
            }
            let members = indices.iter().map(|&i| records[i].clone()).collect();
            groups.push((indices[0], DuplicateGroup::new(hash, bucket.size, members)));
        }
    }

    groups.sort_by_key(|(first, _)| *first);
    groups.into_iter().map(|(_, group)| group).collect()
}
