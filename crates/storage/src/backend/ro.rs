//! Read-only storage backend.
//!
//! Wraps another backend for libraries mounted read-only (or which the
//! operator wants frozen). Reads pass straight through; every mutation fails
//! with [`ReadOnly`](ErrorKind::ReadOnly) so the migration engine treats the
//! move as failed and leaves the catalog untouched.

use async_trait::async_trait;
use std::path::Path;

use crate::error::{ErrorKind, Result};
use crate::{BackendHandle, StorageBackend};

/// Read-only storage backend.
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }

    fn refuse(&self, action: &str, path: &Path) -> exn::Exn<ErrorKind> {
        tracing::warn!(backend = self.inner.name(), path = %path.display(), action, "Refusing write to read-only storage");
        exn::Exn::from(ErrorKind::ReadOnly(path.to_path_buf()))
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, _data: &[u8]) -> Result<()> {
        Err(self.refuse("write", path))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        Err(self.refuse("delete", path))
    }

    async fn rename(&self, from: &Path, _to: &Path) -> Result<()> {
        Err(self.refuse("rename", from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reads_pass_through_and_writes_fail() {
        let temp_dir = tempfile::tempdir().unwrap();
        let local = LocalBackend::new("local", temp_dir.path()).unwrap();
        local.write(Path::new("asset.jpg"), b"jpeg").await.unwrap();
        let backend = ReadOnlyBackend::new(Arc::new(local));

        assert!(backend.exists(Path::new("asset.jpg")).await.unwrap());
        assert_eq!(backend.read(Path::new("asset.jpg")).await.unwrap(), b"jpeg");

        let err = backend.rename(Path::new("asset.jpg"), Path::new("moved.jpg")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::ReadOnly(_)));
        assert!(backend.exists(Path::new("asset.jpg")).await.unwrap());
        assert!(!backend.exists(Path::new("moved.jpg")).await.unwrap());

        assert!(backend.write(Path::new("new.jpg"), b"x").await.is_err());
        assert!(backend.delete(Path::new("asset.jpg")).await.is_err());
    }
}
