//! Keyed blob cache used by the resilient fetch protocol and the audit sink.
//!
//! Implementations are best-effort overwrite stores with no TTL semantics.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AttrSyncError, Result};

/// Maximum accepted blob size (5 MiB), per the object-store contract.
pub const MAX_BLOB_BYTES: usize = 5 * 1024 * 1024;

/// A keyed blob store. Keys may contain `/` separators.
#[async_trait]
pub trait ObjectCache: Send + Sync {
    /// Read a blob. `Ok(None)` means the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a blob, replacing any previous value.
    async fn put(&self, key: &str, data: &[u8]) -> Result<()>;
}

/// Filesystem-backed cache storing each key as a file under a root directory.
pub struct LocalDirCache {
    root: PathBuf,
}

impl LocalDirCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a cache key onto a path under the root, rejecting traversal
    /// components.
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => {
                    return Err(AttrSyncError::Cache(format!(
                        "invalid cache key: {key}"
                    )))
                }
            }
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectCache for LocalDirCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AttrSyncError::Cache(format!(
                "read {} failed: {e}",
                path.display()
            ))),
        }
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        if data.len() > MAX_BLOB_BYTES {
            return Err(AttrSyncError::Cache(format!(
                "blob for {key} is {} bytes, exceeds the {MAX_BLOB_BYTES}-byte limit",
                data.len()
            )));
        }
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AttrSyncError::Cache(format!("create {} failed: {e}", parent.display()))
            })?;
        }
        tokio::fs::write(&path, data).await.map_err(|e| {
            AttrSyncError::Cache(format!("write {} failed: {e}", path.display()))
        })
    }
}

/// In-memory cache, used in tests and embedded setups.
#[derive(Default)]
pub struct MemoryCache {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        if data.len() > MAX_BLOB_BYTES {
            return Err(AttrSyncError::Cache(format!(
                "blob for {key} exceeds the {MAX_BLOB_BYTES}-byte limit"
            )));
        }
        self.blobs
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }
}
