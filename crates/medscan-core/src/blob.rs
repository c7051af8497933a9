use std::path::PathBuf;
use uuid::Uuid;

use crate::{Error, Result};

/// Accepts bytes and hands back a locator the caller can later resolve
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, filename: &str, bytes: &[u8]) -> Result<String>;

    /// Drop a blob that no record will point at
    async fn remove(&self, locator: &str) -> Result<()>;
}

/// Stores blobs as files under a root directory. Locators are file paths.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait::async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::BlobStore(format!("create {}: {e}", self.root.display())))?;

        let path = self.root.join(format!("{}_{}", Uuid::new_v4(), filename));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Error::BlobStore(format!("write {}: {e}", path.display())))?;

        tracing::debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(path.to_string_lossy().to_string())
    }

    async fn remove(&self, locator: &str) -> Result<()> {
        match tokio::fs::remove_file(locator).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::BlobStore(format!("remove {locator}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().join("scans"));

        let locator = store.put("label.png", b"png-bytes").await.unwrap();

        assert!(locator.ends_with("_label.png"));
        assert_eq!(tokio::fs::read(&locator).await.unwrap(), b"png-bytes");
    }

    #[tokio::test]
    async fn test_put_distinct_locators() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        let a = store.put("same.pdf", b"a").await.unwrap();
        let b = store.put("same.pdf", b"b").await.unwrap();

        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let locator = store.put("label.png", b"png-bytes").await.unwrap();

        store.remove(&locator).await.unwrap();

        assert!(!std::path::Path::new(&locator).exists());
        // already gone
        store.remove(&locator).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_unwritable_root() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let store = LocalBlobStore::new(blocker.join("nested"));

        let result = store.put("a.png", b"a").await;

        assert!(matches!(result, Err(Error::BlobStore(_))));
    }
}
