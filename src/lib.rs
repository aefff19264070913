//! fileorg - state layer of a file organizer
//!
//! Scans directory trees into [`scanner::FileRecord`]s, reuses an on-disk
//! scan cache while nothing changed, groups identical content with BLAKE3,
//! and records every move, copy and delete in an append-only operation log
//! whose moves and copies can be undone.
//!
//! ```rust,no_run
//! use fileorg::cache::CacheStore;
//! use fileorg::duplicates::{find_duplicates, DuplicateIndex, KeepStrategy};
//! use fileorg::scanner::{ScanOptions, Scanner};
//!
//! let scanner = Scanner::new(ScanOptions::default()).with_cache(CacheStore::new("/tmp/cache"));
//! let scan = scanner.scan(std::path::Path::new("/data")).unwrap();
//! let outcome = DuplicateIndex::new().build(&scan.records);
//! for selection in find_duplicates(&outcome.records, KeepStrategy::Newest) {
//!     println!("keep {}", selection.keeper.path.display());
//! }
//! ```

pub mod actions;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod oplog;
pub mod scanner;
pub mod signal;

pub use commands::run_app;
