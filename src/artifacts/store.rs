//! Blob storage for sealed artifacts.

use crate::core::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Store implementation identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreType {
    Filesystem,
    Memory,
}

impl std::fmt::Display for StoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreType::Filesystem => write!(f, "filesystem"),
            StoreType::Memory => write!(f, "memory"),
        }
    }
}

/// Named blob storage.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write a blob, replacing any previous one. Readers never observe a
    /// partially written blob.
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<()>;

    /// Read a blob. Fails with `ArtifactMissing` when absent.
    async fn get(&self, name: &str) -> Result<Vec<u8>>;

    /// Whether a blob exists.
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Remove a blob. Removing an absent blob is not an error.
    async fn delete(&self, name: &str) -> Result<()>;

    /// Human-readable location of a blob, for logs.
    fn locate(&self, name: &str) -> String;

    /// Get the store type.
    fn store_type(&self) -> StoreType;
}

/// Blobs as files in one directory.
#[derive(Clone, Debug)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    /// Store rooted at `dir`; the directory is created on first write.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = self.dir.join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, self.path(name)).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(path = %self.path(name).display(), bytes = bytes.len(), "artifact written");
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::ArtifactMissing(
                format!("{} not found", path.display()),
            )),
            Err(e) => Err(Error::ArtifactMissing(format!(
                "{} unreadable: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path(name)).await?)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path(name)).await {
            Ok(()) => {
                debug!(path = %self.path(name).display(), "artifact removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn locate(&self, name: &str) -> String {
        self.path(name).display().to_string()
    }

    fn store_type(&self) -> StoreType {
        StoreType::Filesystem
    }
}

/// In-process blob store.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        self.blobs.write().await.insert(name.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ArtifactMissing(format!("memory://{} not found", name)))
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.blobs.read().await.contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.blobs.write().await.remove(name);
        Ok(())
    }

    fn locate(&self, name: &str) -> String {
        format!("memory://{}", name)
    }

    fn store_type(&self) -> StoreType {
        StoreType::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("models"));

        assert!(!store.exists("model.bin").await.unwrap());
        store.put("model.bin", vec![1, 2, 3]).await.unwrap();
        assert!(store.exists("model.bin").await.unwrap());
        assert_eq!(store.get("model.bin").await.unwrap(), vec![1, 2, 3]);

        store.put("model.bin", vec![9]).await.unwrap();
        assert_eq!(store.get("model.bin").await.unwrap(), vec![9]);

        // no temp files left behind
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("models")).unwrap().collect();
        assert_eq!(entries.len(), 1);

        store.delete("model.bin").await.unwrap();
        assert!(!store.exists("model.bin").await.unwrap());
        store.delete("model.bin").await.unwrap();
    }

    #[tokio::test]
    async fn test_fs_store_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        assert!(matches!(
            store.get("absent.bin").await,
            Err(Error::ArtifactMissing(_))
        ));
        assert!(store.locate("absent.bin").ends_with("absent.bin"));
        assert_eq!(store.store_type(), StoreType::Filesystem);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryArtifactStore::new();
        store.put("a", vec![1]).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), vec![1]);
        store.delete("a").await.unwrap();
        assert!(matches!(store.get("a").await, Err(Error::ArtifactMissing(_))));
        assert_eq!(store.locate("a"), "memory://a");
        assert_eq!(StoreType::Memory.to_string(), "memory");
    }
}
