//! JSON file store for scan caches.
//!
//! Each root directory gets its own cache file, named after a digest of the
//! root path. The file holds a versioned envelope with a SHA-256 checksum of
//! the cache body, and is always written through a temporary file in the
//! same directory followed by an atomic rename. A reader therefore sees either
//! the previous complete file or the new complete file; anything else fails
//! the checksum and is treated as absent.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;

use super::entry::{ScanCache, CACHE_VERSION};
use crate::scanner::{hash_to_hex, Hasher};

/// Errors raised while reading or writing cache files.
///
/// Read-side errors never reach scanner callers: [`CacheStore::load`]
/// reports them as an absent cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache file exists but could not be read.
    #[error("cache unreadable at {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The cache file could not be parsed or failed validation.
    #[error("cache corrupt at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// The cache file could not be written.
    #[error("failed to write cache {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The cache being saved belongs to another root.
    #[error("cache for {found} cannot be saved as cache for {expected}")]
    RootMismatch { expected: PathBuf, found: PathBuf },
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    version: u32,
    checksum: String,
    cache: ScanCache,
}

#[derive(Debug, Deserialize)]
struct VersionProbe {
    version: u32,
}

/// Directory of per-root scan cache files.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the cache files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the cache file for `root`.
    #[must_use]
    pub fn cache_file(&self, root: &Path) -> PathBuf {
        let digest = Hasher::hash_bytes(root.to_string_lossy().as_bytes());
        let name = format!("scan_{}.json", &hash_to_hex(&digest)[..32]);
        self.dir.join(name)
    }

    /// Load the cache for `root`.
    ///
    /// Missing, unreadable, corrupt, wrong-version and wrong-root files all
    /// yield `None`. Staleness against the filesystem is checked separately
    /// with [`ScanCache::check`].
    #[must_use]
    pub fn load(&self, root: &Path) -> Option<ScanCache> {
        match self.try_load(root) {
            Ok(Some(cache)) => {
                log::debug!(
                    "Loaded cache for {} ({} entries, built {})",
                    root.display(),
                    cache.len(),
                    cache.built_at
                );
                Some(cache)
            }
            Ok(None) => {
                log::debug!("No cache for {}", root.display());
                None
            }
            Err(e) => {
                log::warn!("Ignoring cache for {}: {}", root.display(), e);
                None
            }
        }
    }

    /// Load the cache for `root`, reporting why a present file was rejected.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unreadable`] or [`CacheError::Corrupt`]. A
    /// missing file is `Ok(None)`.
    pub fn try_load(&self, root: &Path) -> CacheResult<Option<ScanCache>> {
        let path = self.cache_file(root);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Unreadable { path, source }),
        };

        let corrupt = |reason: String| CacheError::Corrupt {
            path: path.clone(),
            reason,
        };

        let probe: VersionProbe = serde_json::from_str(&content)
            .map_err(|e| corrupt(format!("failed to parse envelope: {e}")))?;
        if probe.version != CACHE_VERSION {
            return Err(corrupt(format!(
                "unsupported version {} (expected {})",
                probe.version, CACHE_VERSION
            )));
        }

        let envelope: CacheEnvelope = serde_json::from_str(&content)
            .map_err(|e| corrupt(format!("failed to parse cache: {e}")))?;

        let checksum = checksum(&envelope.cache).map_err(|e| corrupt(e.to_string()))?;
        if checksum != envelope.checksum {
            return Err(corrupt("checksum mismatch".to_string()));
        }

        let cache = envelope.cache;
        if cache.root_path != root {
            return Err(corrupt(format!(
                "belongs to {}",
                cache.root_path.display()
            )));
        }
        if !cache.is_consistent() {
            return Err(corrupt("entry outside root".to_string()));
        }

        Ok(Some(cache))
    }

    /// Persist `cache` as the cache for `root`, atomically replacing any previous file.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Write`] if the directory, temporary file or
    /// rename fails, and [`CacheError::RootMismatch`] if `cache` was built
    /// for a different root.
    pub fn save(&self, root: &Path, cache: &ScanCache) -> CacheResult<PathBuf> {
        if cache.root_path != root {
            return Err(CacheError::RootMismatch {
                expected: root.to_path_buf(),
                found: cache.root_path.clone(),
            });
        }

        let target = self.cache_file(root);
        let write_err = |source: io::Error| CacheError::Write {
            path: target.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(write_err)?;

        let envelope = CacheEnvelope {
            version: CACHE_VERSION,
            checksum: checksum(cache).map_err(|e| write_err(io::Error::other(e)))?,
            cache: cache.clone(),
        };
        let json =
            serde_json::to_string_pretty(&envelope).map_err(|e| write_err(io::Error::other(e)))?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&target).map_err(|e| write_err(e.error))?;

        log::debug!(
            "Saved cache for {} ({} entries) to {}",
            root.display(),
            cache.len(),
            target.display()
        );
        Ok(target)
    }

    /// Remove the cache for `root`. Returns whether a file was removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Write`] if the file exists but cannot be removed.
    pub fn invalidate(&self, root: &Path) -> CacheResult<bool> {
        let path = self.cache_file(root);
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("Invalidated cache for {}", root.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Write { path, source }),
        }
    }

    /// Remove every cache file in the store. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unreadable`] if the directory cannot be listed.
    pub fn clear_all(&self) -> CacheResult<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(CacheError::Unreadable {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("scan_") && name.ends_with(".json") {
                match fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) => log::warn!("Failed to remove {}: {}", entry.path().display(), e),
                }
            }
        }

        log::info!("Cleared {} cache file(s)", removed);
        Ok(removed)
    }
}

/// SHA-256 over the compact serialization of the cache body.
fn checksum(cache: &ScanCache) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(cache)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}
