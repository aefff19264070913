//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Size-based bucketing (phase 1)
//! - Content hash grouping on a bounded pool (phase 2)
//! - Keep strategies selecting the member to retain
//!
//! The index is a pure function of its input records and the file contents.
//! Groups are never persisted; they are rebuilt from a fresh or cached scan.

pub mod finder;
pub mod groups;
pub mod strategy;

pub use finder::{group_hashed, DuplicateError, DuplicateIndex, IndexOutcome, IndexStats};
pub use groups::{group_by_size, DuplicateGroup, GroupingStats, SizeBucket};
pub use strategy::{candidates, find_duplicates, keep, KeepStrategy, Selection};
