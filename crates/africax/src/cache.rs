//! Memoization of file loads.
//!
//! A load result is reused only while the file it came from is unchanged.
//! Change is detected by a [`FileStamp`]: path, size, modification time and a
//! BLAKE3 hash of the content.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::trace;

use crate::error::Result;

/// Identity and content fingerprint of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStamp {
    path: PathBuf,
    len: u64,
    modified: Option<SystemTime>,
    hash: String,
}

impl FileStamp {
    /// Read a file, returning its stamp and its content.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read(path: &Path) -> Result<(Self, Vec<u8>)> {
        let bytes = fs::read(path)?;
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok();
        let stamp = Self::of_bytes(path, &bytes, modified);
        Ok((stamp, bytes))
    }

    /// Stamp for content already in memory.
    #[must_use]
    pub fn of_bytes(path: &Path, bytes: &[u8], modified: Option<SystemTime>) -> Self {
        Self {
            path: path.to_path_buf(),
            len: bytes.len() as u64,
            modified,
            hash: blake3::hash(bytes).to_hex().to_string(),
        }
    }

    /// The stamped path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hex BLAKE3 hash of the content.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// A single-entry memo keyed by `K`.
#[derive(Debug)]
pub struct Memo<K, T> {
    entry: Option<(K, T)>,
    hits: u64,
    misses: u64,
}

impl<K, T> Default for Memo<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> Memo<K, T> {
    /// An empty memo.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entry: None,
            hits: 0,
            misses: 0,
        }
    }

    /// Drop the cached value.
    pub fn invalidate(&mut self) {
        if self.entry.take().is_some() {
            trace!("Cache invalidated");
        }
    }

    /// Number of lookups served from the cache.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Number of lookups that missed.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Whether a value is cached.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.entry.is_some()
    }
}

impl<K: PartialEq, T: Clone> Memo<K, T> {
    /// Cached value for `key`, if the cached entry was stored under an equal key.
    pub fn get(&mut self, key: &K) -> Option<T> {
        match &self.entry {
            Some((cached, value)) if cached == key => {
                self.hits += 1;
                Some(value.clone())
            }
            _ => {
                self.misses += 1;
                None
            }
        }
    }

    /// Cache `value` under `key`, replacing any previous entry.
    pub fn put(&mut self, key: K, value: T) {
        self.entry = Some((key, value));
    }
}
