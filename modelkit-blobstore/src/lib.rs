//! Path-addressed blob storage.
//!
//! Import and export files go through the [`BlobStore`] trait so callers can
//! point them at a directory on disk ([`FsBlobStore`]) or keep them in memory
//! ([`MemoryBlobStore`]). Paths are relative, `/`-separated, and may not
//! escape the store root.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur in blob operations.
#[derive(Debug, Error)]
pub enum BlobStoreError {
    /// Blob not found.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// Path is absolute or climbs out of the store root.
    #[error("invalid blob path: {0}")]
    InvalidPath(String),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend failure that is not an IO error.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for blob operations.
pub type BlobStoreResult<T> = Result<T, BlobStoreError>;

/// A store of byte blobs addressed by relative path.
pub trait BlobStore: Send + Sync {
    fn exists(&self, path: &str) -> BlobStoreResult<bool>;

    fn get(&self, path: &str) -> BlobStoreResult<Vec<u8>>;

    /// Writes `bytes` at `path`, replacing any previous blob.
    fn put(&self, path: &str, bytes: &[u8]) -> BlobStoreResult<()>;

    /// Removes the blob. Returns whether one existed.
    fn delete(&self, path: &str) -> BlobStoreResult<bool>;
}

/// Validates a relative blob path and returns its components.
fn normalize(path: &str) -> BlobStoreResult<PathBuf> {
    let p = Path::new(path);
    let mut out = PathBuf::new();
    for component in p.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return Err(BlobStoreError::InvalidPath(path.to_string())),
        }
    }
    if out.as_os_str().is_empty() {
        return Err(BlobStoreError::InvalidPath(path.to_string()));
    }
    Ok(out)
}

/// Blobs stored as files under a root directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Creates the root directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> BlobStoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> BlobStoreResult<PathBuf> {
        Ok(self.root.join(normalize(path)?))
    }
}

impl BlobStore for FsBlobStore {
    fn exists(&self, path: &str) -> BlobStoreResult<bool> {
        Ok(self.resolve(path)?.is_file())
    }

    fn get(&self, path: &str) -> BlobStoreResult<Vec<u8>> {
        let full = self.resolve(path)?;
        match std::fs::read(&full) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobStoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, path: &str, bytes: &[u8]) -> BlobStoreResult<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full, bytes)?;
        debug!("wrote {} bytes to {}", bytes.len(), full.display());
        Ok(())
    }

    fn delete(&self, path: &str) -> BlobStoreResult<bool> {
        let full = self.resolve(path)?;
        match std::fs::remove_file(&full) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Blobs kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_blobs<T>(&self, f: impl FnOnce(&mut BTreeMap<PathBuf, Vec<u8>>) -> T) -> BlobStoreResult<T> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| BlobStoreError::Storage("blob map lock poisoned".into()))?;
        Ok(f(&mut blobs))
    }
}

impl BlobStore for MemoryBlobStore {
    fn exists(&self, path: &str) -> BlobStoreResult<bool> {
        let key = normalize(path)?;
        self.with_blobs(|b| b.contains_key(&key))
    }

    fn get(&self, path: &str) -> BlobStoreResult<Vec<u8>> {
        let key = normalize(path)?;
        self.with_blobs(|b| b.get(&key).cloned())?
            .ok_or_else(|| BlobStoreError::NotFound(path.to_string()))
    }

    fn put(&self, path: &str, bytes: &[u8]) -> BlobStoreResult<()> {
        let key = normalize(path)?;
        self.with_blobs(|b| {
            b.insert(key, bytes.to_vec());
        })
    }

    fn delete(&self, path: &str) -> BlobStoreResult<bool> {
        let key = normalize(path)?;
        self.with_blobs(|b| b.remove(&key).is_some())
    }
}
