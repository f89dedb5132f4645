//! Blob storage for raw documents and persisted indexes.
//!
//! Keys are `/`-separated relative paths. Each document set owns the
//! `{id}/documents/` and `{id}/index/` prefixes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{RagError, Result};

/// Key of an uploaded document.
pub fn document_key(document_set: &str, name: &str) -> String {
    format!("{document_set}/documents/{name}")
}

/// Prefix under which all documents of a set are stored.
pub fn documents_prefix(document_set: &str) -> String {
    format!("{document_set}/documents/")
}

/// Key of a persisted index artifact.
pub fn index_key(document_set: &str, artifact: &str) -> String {
    format!("{document_set}/index/{artifact}")
}

/// Reject keys that could escape the store root.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(RagError::InvalidKey(key.to_string()));
    }
    if key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err(RagError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// A durable key-value blob store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, replacing any previous value.
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()>;

    /// Fetch the value stored under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// List all keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// A URL under which `key` can be fetched by clients, if the store
    /// exposes one.
    fn public_url(&self, _key: &str) -> Option<String> {
        None
    }
}

/// A blob store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        validate_key(key)?;
        self.blobs.write().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let blobs = self.blobs.read().await;
        Ok(blobs
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.blobs.write().await.remove(key);
        Ok(())
    }
}

/// A blob store backed by a directory on the local file system.
///
/// Writes go to a temporary sibling file that is renamed into place, so a
/// reader never observes a half-written blob.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), public_base_url: None }
    }

    /// Serve [`public_url`](BlobStore::public_url)s as `{base}/files/{key}`.
    pub fn with_public_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.public_base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

fn storage_error(key: &str, err: impl std::fmt::Display) -> RagError {
    RagError::Storage { key: key.to_string(), message: err.to_string() }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| storage_error(key, e))?;
        }
        let mut staging = path.clone().into_os_string();
        staging.push(".partial");
        let staging = PathBuf::from(staging);
        tokio::fs::write(&staging, &data).await.map_err(|e| storage_error(key, e))?;
        tokio::fs::rename(&staging, &path).await.map_err(|e| storage_error(key, e))?;
        debug!(key, bytes = data.len(), "stored blob");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(key, e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        // Only the directory part of the prefix narrows the walk.
        let start_key = prefix.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let start = if start_key.is_empty() { self.root.clone() } else { self.path_for(start_key)? };

        let mut keys = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(storage_error(prefix, e)),
            };
            while let Some(entry) = entries.next_entry().await.map_err(|e| storage_error(prefix, e))? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| storage_error(prefix, e))?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else { continue };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) && !key.ends_with(".partial") {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(key, e)),
        }
    }

    fn public_url(&self, key: &str) -> Option<String> {
        self.public_base_url.as_ref().map(|base| format!("{base}/files/{key}"))
    }
}
