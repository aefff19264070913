//! Scan caching module.
//!
//! This module persists the result of a scan so that a later scan of the same
//! root can skip the walk entirely when nothing changed.
//!
//! # Architecture
//!
//! The caching system is split into two main components:
//!
//! * [`store`]: JSON file persistence, one checksummed file per root, written atomically.
//! * [`entry`]: The [`ScanCache`] data model and its staleness check.
//!
//! # Cache Invalidation
//!
//! A cache is stale when any of these modification times changed:
//! * The root directory
//! * Any walked directory below the root (files added, removed or renamed)
//! * Any still-present file recorded in the cache
//!
//! Content is never compared. A file rewritten with a preserved modification
//! time keeps its cached record, including its content hash.
//!
//! Unreadable, corrupt or foreign cache files are treated exactly like a
//! missing cache.

pub mod entry;
pub mod store;

pub use entry::{ScanCache, Staleness, CACHE_VERSION};
pub use store::{CacheError, CacheResult, CacheStore};
