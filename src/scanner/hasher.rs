//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! This module provides the [`Hasher`] struct for computing BLAKE3 digests
//! of file contents using a fixed-size read buffer, so memory use stays
//! constant regardless of file size. Digests are used to compare content for
//! deduplication only; they carry no integrity or security guarantee.
//!
//! # Example
//!
//! ```no_run
//! use fileorg::scanner::{hash_to_hex, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let hash = hasher.full_hash(Path::new("photo.jpg")).unwrap();
//! println!("{}", hash_to_hex(&hash));
//! ```

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::HashError;

/// A 32-byte BLAKE3 content digest.
pub type Hash = [u8; 32];

/// Read buffer size for streaming hashing (64 KiB).
pub const BUFFER_SIZE: usize = 64 * 1024;

/// Streaming BLAKE3 hasher.
#[derive(Debug, Clone, Default)]
pub struct Hasher {
    /// Optional shutdown flag checked between buffer reads.
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Hasher {
    /// Create a new hasher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// A hash interrupted by the flag fails with an `Interrupted` I/O error.
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

    /// Hash the entire content of a file.
    ///
    /// Symbolic links are followed, so a link hashes to its target's content.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn full_hash(&self, path: &Path) -> Result<Hash, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];

        loop {
            if self.is_shutdown_requested() {
                return Err(HashError::Io {
                    path: path.to_path_buf(),
                    source: io::Error::new(io::ErrorKind::Interrupted, "hashing interrupted"),
                });
            }

            let read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buffer[..read]);
        }

        log::trace!("Hashed {}", path.display());
        Ok(*hasher.finalize().as_bytes())
    }

    /// Hash an in-memory byte slice.
    #[must_use]
    pub fn hash_bytes(data: &[u8]) -> Hash {
        *blake3::hash(data).as_bytes()
    }
}

/// Format a digest as lowercase hexadecimal (64 characters).
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Parse a 64-character hexadecimal string back into a digest.
///
/// Returns `None` if the string has the wrong length or contains non-hex characters.
#[must_use]
pub fn hex_to_hash(hex: &str) -> Option<Hash> {
    if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let mut hash = [0u8; 32];
    for (i, byte) in hash.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(hash)
}

/// Serde adapter storing an optional digest as a hex string.
pub mod serde_hash {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{hash_to_hex, hex_to_hash, Hash};

    /// Serialize `Option<Hash>` as an optional hex string.
    pub fn serialize<S>(hash: &Option<Hash>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match hash {
            Some(h) => serializer.serialize_some(&hash_to_hex(h)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an optional hex string into `Option<Hash>`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Hash>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: Option<String> = Option::deserialize(deserializer)?;
        match value {
            Some(hex) => hex_to_hash(&hex)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid content hash: {hex}"))),
            None => Ok(None),
        }
    }
}
