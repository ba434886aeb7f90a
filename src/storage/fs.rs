use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{validate_key, BlobStore, StorageError, PARTIAL_SUFFIX};

/// Blobs as flat files under a root directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Creates the root directory if it does not exist
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        // write to a sibling temp file first so readers never see a partial blob
        let tmp = self.root.join(format!("{}{}", key, PARTIAL_SUFFIX));
        let written = match tokio::fs::write(&tmp, &bytes).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", tmp.display(), cleanup);
                }
            }
            return Err(e.into());
        }
        debug!("Stored blob {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path().join("blobs")).await.unwrap();

        store.put("a.png", vec![1, 2, 3]).await.unwrap();
        assert_eq!(store.get("a.png").await.unwrap(), vec![1, 2, 3]);
        assert!(!store.root().join("a.png.partial").exists());

        store.delete("a.png").await.unwrap();
        assert!(matches!(store.get("a.png").await, Err(StorageError::NotFound(_))));
        assert!(matches!(store.delete("a.png").await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn failed_put_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();
        // a non-empty directory in the way makes the final rename fail
        std::fs::create_dir(store.root().join("a.png")).unwrap();
        std::fs::write(store.root().join("a.png").join("keep"), b"x").unwrap();

        assert!(matches!(store.put("a.png", vec![1, 2, 3]).await, Err(StorageError::Io(_))));
        assert!(!store.root().join("a.png.partial").exists());
        assert!(matches!(
            store.get("a.png.partial").await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn refuses_keys_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();
        assert!(matches!(
            store.put("../escape.png", vec![0]).await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
