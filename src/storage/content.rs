//! Content-addressed blob store
//!
//! Each item lives at `<root>/<hash[0..2]>/<hash>.json` where `hash` is the
//! SHA-256 hex digest of the item's URL. A blob is written once and never
//! rewritten, unless what is on disk no longer parses.
//!
//! Writes go to a temp file in the shard directory that is linked into place
//! only when no blob exists, so a failed write never leaves a partial blob.

use crate::state::CrawledItem;
use crate::storage::{StorageError, StorageResult};
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{trace, warn};

/// Computes the content hash for a URL
pub fn content_hash(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Outcome of [`ContentStore::store`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    pub hash: String,
    pub path: PathBuf,
    /// True when a blob for this URL was already present and left untouched
    pub existed: bool,
}

/// Hash-keyed JSON files under a root directory
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the blob for a given hash
    pub fn path_for_hash(&self, hash: &str) -> PathBuf {
        let shard = hash.get(..2).unwrap_or(hash);
        self.root.join(shard).join(format!("{}.json", hash))
    }

    /// Writes the item unless a readable blob for its URL exists
    pub fn store(&self, item: &CrawledItem) -> StorageResult<StoredContent> {
        let hash = content_hash(&item.url);
        let path = self.path_for_hash(&hash);
        let shard = path.parent().unwrap_or(self.root.as_path());
        std::fs::create_dir_all(shard)?;

        let json = serde_json::to_vec_pretty(item)?;
        let mut temp = NamedTempFile::new_in(shard)?;
        temp.write_all(&json)?;
        temp.as_file().sync_data()?;

        let existed = match temp.persist_noclobber(&path) {
            Ok(_) => {
                trace!("Stored {} at {}", item.url, path.display());
                false
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                if is_readable(&path) {
                    true
                } else {
                    warn!("Replacing unreadable blob {}", path.display());
                    e.file.persist(&path).map_err(|e| e.error)?;
                    false
                }
            }
            Err(e) => return Err(e.error.into()),
        };

        Ok(StoredContent {
            hash,
            path,
            existed,
        })
    }

    /// Reads the item stored for a URL
    ///
    /// `Ok(None)` when nothing is stored; [`StorageError::Corrupted`] when the
    /// blob does not deserialize.
    pub fn retrieve(&self, url: &str) -> StorageResult<Option<CrawledItem>> {
        let path = self.path_for_hash(&content_hash(url));
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StorageError::Corrupted {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }

    /// Checks for a blob without reading it
    pub fn exists(&self, url: &str) -> bool {
        self.path_for_hash(&content_hash(url)).is_file()
    }
}

fn is_readable(path: &Path) -> bool {
    std::fs::read(path)
        .ok()
        .is_some_and(|bytes| serde_json::from_slice::<CrawledItem>(&bytes).is_ok())
}
