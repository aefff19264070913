//! Path helpers for cache keys and keep-strategy ordering.
//!
//! Cache entries are keyed by their path relative to the scanned root. Keys
//! are normalized to Unicode NFC and always use `/` as separator, so the same
//! file produces the same key on macOS (NFD on disk) and on Linux or Windows.
//!
//! # Example
//!
//! ```
//! use fileorg::scanner::path_utils::{normalize_path_str, relative_key};
//! use std::path::Path;
//!
//! // These look identical but have different Unicode representations
//! assert_eq!(normalize_path_str("café.txt"), normalize_path_str("cafe\u{0301}.txt"));
//!
//! let key = relative_key(Path::new("/root"), Path::new("/root/photos/a.jpg"));
//! assert_eq!(key.as_deref(), Some("photos/a.jpg"));
//! ```

use std::borrow::Cow;
use std::path::{Component, Path};
use unicode_normalization::{is_nfc_quick, IsNormalized, UnicodeNormalization};

/// Normalize a path string to NFC (Composed) form.
#[must_use]
pub fn normalize_path_str(s: &str) -> String {
    s.nfc().collect()
}

/// Normalize to NFC, borrowing when the input is already normalized.
#[must_use]
pub fn normalize_path_str_cow(s: &str) -> Cow<'_, str> {
    match is_nfc_quick(s.chars()) {
        IsNormalized::Yes => Cow::Borrowed(s),
        _ => Cow::Owned(normalize_path_str(s)),
    }
}

/// Build the cache key of `path` relative to `root`.
///
/// Returns `None` if `path` does not lie under `root`. The root itself maps
/// to the empty key.
#[must_use]
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<Cow<'_, str>> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .collect();

    let joined = parts.join("/");
    Some(normalize_path_str_cow(&joined).into_owned())
}

/// Number of normal components in a path (`/a/b/c.txt` has three).
#[must_use]
pub fn path_depth(path: &Path) -> usize {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
}

/// Length of the path in characters (not bytes).
#[must_use]
pub fn path_char_len(path: &Path) -> usize {
    path.to_string_lossy().chars().count()
}

/// Serde adapter storing a path without loss.
///
/// Paths that are valid Unicode are written as strings. Others are written
/// as their raw bytes on Unix and as UTF-16 code units on Windows.
pub mod serde_path {
    use std::path::{Path, PathBuf};

    use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Encoded {
        Text(String),
        #[cfg(unix)]
        Bytes(Vec<u8>),
        #[cfg(windows)]
        Wide(Vec<u16>),
    }

    /// Serialize a path as a string, or as raw units when it is not Unicode.
    pub fn serialize<S>(path: &Path, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded = match path.to_str() {
            Some(text) => Encoded::Text(text.to_string()),
            None => raw(path)
                .ok_or_else(|| <S::Error as ser::Error>::custom("unrepresentable path"))?,
        };
        encoded.serialize(serializer)
    }

    /// Deserialize a path written by [`serialize`].
    pub fn deserialize<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Encoded::deserialize(deserializer)? {
            Encoded::Text(text) => Ok(PathBuf::from(text)),
            #[cfg(unix)]
            Encoded::Bytes(bytes) => {
                use std::ffi::OsString;
                use std::os::unix::ffi::OsStringExt;
                Ok(PathBuf::from(OsString::from_vec(bytes)))
            }
            #[cfg(windows)]
            Encoded::Wide(units) => {
                use std::ffi::OsString;
                use std::os::windows::ffi::OsStringExt;
                Ok(PathBuf::from(OsString::from_wide(&units)))
            }
            #[allow(unreachable_patterns)]
            _ => Err(de::Error::custom("unsupported path encoding")),
        }
    }

    #[cfg(unix)]
    fn raw(path: &Path) -> Option<Encoded> {
        use std::os::unix::ffi::OsStrExt;
        Some(Encoded::Bytes(path.as_os_str().as_bytes().to_vec()))
    }

    #[cfg(windows)]
    fn raw(path: &Path) -> Option<Encoded> {
        use std::os::windows::ffi::OsStrExt;
        Some(Encoded::Wide(path.as_os_str().encode_wide().collect()))
    }

    #[cfg(not(any(unix, windows)))]
    fn raw(_path: &Path) -> Option<Encoded> {
        None
    }
}
