//! Duplicate grouping and size-based bucketing.
//!
//! # Overview
//!
//! Size bucketing is the first phase of duplicate detection. Files with
//! different sizes cannot share content, so only buckets holding two or more
//! records go on to hashing. Empty files are left out entirely: every empty
//! file would match every other one, and removing them saves nothing.
//!
//! # Example
//!
//! ```
//! use fileorg::scanner::FileRecord;
//! use fileorg::duplicates::group_by_size;
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let records = vec![
//!     FileRecord::new(PathBuf::from("/a.txt"), 100, SystemTime::UNIX_EPOCH),
//!     FileRecord::new(PathBuf::from("/b.txt"), 100, SystemTime::UNIX_EPOCH),
//!     FileRecord::new(PathBuf::from("/c.txt"), 200, SystemTime::UNIX_EPOCH),
//! ];
//!
//! let (buckets, stats) = group_by_size(&records);
//!
//! assert_eq!(buckets.len(), 1);
//! assert_eq!(buckets[0].indices, vec![0, 1]);
//! assert_eq!(stats.eliminated_unique, 1);
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use crate::scanner::{hash_to_hex, FileRecord, Hash};

/// Records sharing one exact size, referenced by their input position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeBucket {
    /// File size in bytes (shared by all members)
    pub size: u64,
    /// Positions of the members in the input, ascending
    pub indices: Vec<usize>,
}

impl SizeBucket {
    /// Number of records in this bucket.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Check if this bucket is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Confirmed group of files with identical content.
///
/// Members keep the order in which they appeared in the input records, and
/// a group always has at least two members of non-zero size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// BLAKE3 hash of the shared content
    pub hash: Hash,
    /// File size in bytes (shared by all members)
    pub size: u64,
    /// The duplicate files
    pub members: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Create a new duplicate group.
    #[must_use]
    pub fn new(hash: Hash, size: u64, members: Vec<FileRecord>) -> Self {
        Self {
            hash,
            size,
            members,
        }
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Total size of all files in this group.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.size * self.members.len() as u64
    }

    /// Space taken by every copy beyond the first.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * self.duplicate_count() as u64
    }

    /// Number of duplicate copies (total - 1 original).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.members.len().saturating_sub(1)
    }

    /// Hash as hexadecimal string.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hash_to_hex(&self.hash)
    }

    /// Paths of the members, in member order.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.members.iter().map(|m| m.path.clone()).collect()
    }
}

/// Statistics from the size bucketing phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingStats {
    /// Total number of records processed
    pub total_files: usize,
    /// Total size of all records in bytes
    pub total_size: u64,
    /// Number of distinct non-zero sizes
    pub unique_sizes: usize,
    /// Records left in buckets of two or more
    pub potential_duplicates: usize,
    /// Records eliminated because their size is unique
    pub eliminated_unique: usize,
    /// Empty files skipped
    pub empty_files: usize,
    /// Buckets with two or more records
    pub size_buckets: usize,
}

impl GroupingStats {
    /// Percentage of records eliminated by size alone.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.eliminated_unique as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Bucket records by exact size.
///
/// Returns only buckets with two or more records, ordered by the position of
/// their first member. No file I/O is performed.
#[must_use]
pub fn group_by_size(records: &[FileRecord]) -> (Vec<SizeBucket>, GroupingStats) {
    let mut stats = GroupingStats::default();
    let mut order: Vec<u64> = Vec::new();
    let mut by_size: HashMap<u64, Vec<usize>> = HashMap::new();

    for (idx, record) in records.iter().enumerate() {
        stats.total_files += 1;
        stats.total_size += record.size;

        if record.size == 0 {
            stats.empty_files += 1;
            log::trace!("Skipping empty file: {}", record.path.display());
            continue;
        }

        by_size
            .entry(record.size)
            .or_insert_with(|| {
                order.push(record.size);
                Vec::new()
            })
            .push(idx);
    }

    if stats.empty_files > 0 {
        log::debug!("Skipped {} empty file(s)", stats.empty_files);
    }

    stats.unique_sizes = order.len();

    let mut buckets = Vec::new();
    for size in order {
        let Some(indices) = by_size.remove(&size) else {
            continue;
        };
        if indices.len() == 1 {
            stats.eliminated_unique += 1;
            continue;
        }
        stats.potential_duplicates += indices.len();
        stats.size_buckets += 1;
        buckets.push(SizeBucket { size, indices });
    }

    log::debug!(
        "Size phase: {} files -> {} potential duplicates ({:.1}% eliminated)",
        stats.total_files,
        stats.potential_duplicates,
        stats.elimination_rate()
    );

    (buckets, stats)
}
