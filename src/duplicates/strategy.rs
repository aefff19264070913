//! Keep strategies: which member of a duplicate group to retain.
//!
//! Every strategy is a total order over the members, so the keeper is the
//! same on every run regardless of hashing completion order.
//!
//! | Strategy | Primary key | Tie-breaks |
//! |---|---|---|
//! | `newest` | latest modification time | shorter path, then lexicographic path |
//! | `oldest` | earliest modification time | shorter path, then lexicographic path |
//! | `shortest_path` | fewest segments, then fewest characters | newest, then lexicographic path |
//! | `first` | position in the input records | none needed |

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::finder::group_hashed;
use super::groups::DuplicateGroup;
use crate::scanner::path_utils::{path_char_len, path_depth};
use crate::scanner::FileRecord;

/// Rule selecting the member of a duplicate group to keep.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum KeepStrategy {
    /// Keep the most recently modified file
    #[default]
    Newest,
    /// Keep the least recently modified file
    Oldest,
    /// Keep the file with the shortest path
    ShortestPath,
    /// Keep the file that appeared first in the scan
    First,
}

impl fmt::Display for KeepStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::ShortestPath => "shortest_path",
            Self::First => "first",
        };
        f.write_str(name)
    }
}

impl KeepStrategy {
    /// Ordering where `Less` means `a` is preferred over `b`.
    fn prefer(self, a: &FileRecord, b: &FileRecord) -> Ordering {
        let shorter = || path_char_len(&a.path).cmp(&path_char_len(&b.path));
        let lexical = || a.path.cmp(&b.path);

        match self {
            Self::Newest => b
                .modified_at
                .cmp(&a.modified_at)
                .then_with(shorter)
                .then_with(lexical),
            Self::Oldest => a
                .modified_at
                .cmp(&b.modified_at)
                .then_with(shorter)
                .then_with(lexical),
            Self::ShortestPath => path_depth(&a.path)
                .cmp(&path_depth(&b.path))
                .then_with(shorter)
                .then_with(|| b.modified_at.cmp(&a.modified_at))
                .then_with(lexical),
            Self::First => Ordering::Equal,
        }
    }
}

/// Position of the keeper within `group.members`.
fn keeper_index(group: &DuplicateGroup, strategy: KeepStrategy) -> Option<usize> {
    if strategy == KeepStrategy::First {
        return (!group.members.is_empty()).then_some(0);
    }
    group
        .members
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| strategy.prefer(a, b))
        .map(|(i, _)| i)
}

/// The member of `group` to retain. `None` only for an empty group.
#[must_use]
pub fn keep(group: &DuplicateGroup, strategy: KeepStrategy) -> Option<&FileRecord> {
    keeper_index(group, strategy).map(|i| &group.members[i])
}

/// Every member except the keeper, in member order.
#[must_use]
pub fn candidates(group: &DuplicateGroup, strategy: KeepStrategy) -> Vec<&FileRecord> {
    let keeper = keeper_index(group, strategy);
    group
        .members
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != keeper)
        .map(|(_, m)| m)
        .collect()
}

/// A duplicate group with its keeper and removal candidates resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// The group
    pub group: DuplicateGroup,
    /// Member to retain
    pub keeper: FileRecord,
    /// Members that may be removed or moved away
    pub candidates: Vec<FileRecord>,
}

impl Selection {
    /// Resolve keeper and candidates for `group`.
    ///
    /// Returns `None` for an empty group.
    #[must_use]
    pub fn resolve(group: DuplicateGroup, strategy: KeepStrategy) -> Option<Self> {
        let keeper = keep(&group, strategy)?.clone();
        let candidates = candidates(&group, strategy).into_iter().cloned().collect();
        Some(Self {
            group,
            keeper,
            candidates,
        })
    }
}

/// Group already-hashed records and resolve every group. Performs no I/O.
///
/// Records without a content hash are ignored; run
/// [`DuplicateIndex::build`](super::DuplicateIndex::build) first to hash the
/// candidates.
#[must_use]
pub fn find_duplicates(records: &[FileRecord], strategy: KeepStrategy) -> Vec<Selection> {
    group_hashed(records)
        .into_iter()
        .filter_map(|group| Selection::resolve(group, strategy))
        .collect()
}
