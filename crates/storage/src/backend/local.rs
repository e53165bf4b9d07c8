//! Local filesystem storage backend.
//!
//! Files live under a configured root directory and are accessed with
//! `tokio::fs`.

use crate::error::ErrorKind;
use crate::{StorageBackend, error::Result, path::validate as validate_path};
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::create_dir_all as sync_create_dir;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem storage backend.
///
/// All paths are relative to the configured root directory.
///
/// # Examples
///
/// ```no_run
/// use stowage_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local", "/srv/photos")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory for the library
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend rooted at an absolute directory,
    /// creating the directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPath`](ErrorKind::InvalidPath) if the root is relative
    /// or points at something that isn't a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Only happens once at startup; not worth making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self { name: name.into(), root })
    }

    /// Validates the relative path and joins it onto the root directory.
    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            IoErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            IoErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            IoErrorKind::ReadOnlyFilesystem => ErrorKind::ReadOnly(path.to_path_buf()),
            IoErrorKind::AlreadyExists => ErrorKind::AlreadyExists(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// `rename(2)` can't cross mount points, so copy the file over and remove
    /// the source. If the source can't be removed the copy is discarded again,
    /// leaving a single file at `from`.
    async fn copy_across_devices(&self, from: &Path, to: &Path, relative_to: &Path) -> Result<()> {
        fs::copy(from, to).await.map_err(|e| Self::map_io_error(e, relative_to))?;
        if let Err(e) = fs::remove_file(from).await {
            if let Err(cleanup) = fs::remove_file(to).await {
                tracing::error!(
                    backend = %self.name,
                    path = %to.display(),
                    error = %cleanup,
                    "Could not remove copy after failed cross-device move"
                );
            }
            return Err(e).or_raise(|| ErrorKind::BackendError(format!("cross-device move of {}", from.display())));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, path))?;
        }
        Ok(fs::write(&abs_path, data).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::remove_file(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from_path = self.absolute_path(from)?;
        let to_path = self.absolute_path(to)?;
        if !fs::try_exists(&from_path).await.map_err(|e| Self::map_io_error(e, from))? {
            exn::bail!(ErrorKind::NotFound(from.to_path_buf()));
        }
        // fs::rename silently replaces an existing destination on Unix.
        if fs::try_exists(&to_path).await.map_err(|e| Self::map_io_error(e, to))? {
            exn::bail!(ErrorKind::AlreadyExists(to.to_path_buf()));
        }
        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, to))?;
        }
        match fs::rename(&from_path, &to_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::CrossesDevices => {
                self.copy_across_devices(&from_path, &to_path, to).await
            },
            Err(e) => Err(exn::Exn::from(Self::map_io_error(e, to))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> (tempfile::TempDir, LocalBackend) {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("local", temp_dir.path()).unwrap();
        (temp_dir, backend)
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("local", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("local", "relative/path").is_err());
        assert!(LocalBackend::new("local", "./relative").is_err());
    }

    #[test]
    fn test_new_creates_missing_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("nested/library");
        LocalBackend::new("local", &root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_absolute_path() {
        let (temp_dir, backend) = backend();
        let expected = temp_dir.path().join("upload/library/user-id/asset.jpg");
        assert_eq!(backend.absolute_path("upload/library/user-id/asset.jpg").unwrap(), expected);
        assert!(backend.absolute_path("../etc/passwd").is_err());
    }

    #[tokio::test]
    async fn test_exists() {
        let (_dir, backend) = backend();
        assert!(!backend.exists(Path::new("asset.jpg")).await.unwrap());
        backend.write(Path::new("asset.jpg"), b"jpeg").await.unwrap();
        assert!(backend.exists(Path::new("asset.jpg")).await.unwrap());
    }

    #[tokio::test]
    async fn test_rename_creates_directories() {
        let (_dir, backend) = backend();
        backend.write(Path::new("upload/asset.jpg"), b"jpeg").await.unwrap();
        backend
            .rename(Path::new("upload/asset.jpg"), Path::new("upload/library/user-id/2023/asset.jpg"))
            .await
            .unwrap();
        assert!(!backend.exists(Path::new("upload/asset.jpg")).await.unwrap());
        assert_eq!(backend.read(Path::new("upload/library/user-id/2023/asset.jpg")).await.unwrap(), b"jpeg");
    }

    #[tokio::test]
    async fn test_rename_never_overwrites() {
        let (_dir, backend) = backend();
        backend.write(Path::new("a.jpg"), b"first").await.unwrap();
        backend.write(Path::new("b.jpg"), b"second").await.unwrap();
        let err = backend.rename(Path::new("a.jpg"), Path::new("b.jpg")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));
        assert_eq!(backend.read(Path::new("a.jpg")).await.unwrap(), b"first");
        assert_eq!(backend.read(Path::new("b.jpg")).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_rename_missing_source() {
        let (_dir, backend) = backend();
        let err = backend.rename(Path::new("missing.jpg"), Path::new("new.jpg")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let (_dir, backend) = backend();
        backend.write(Path::new("asset.jpg"), b"jpeg").await.unwrap();
        backend.delete(Path::new("asset.jpg")).await.unwrap();
        let err = backend.delete(Path::new("asset.jpg")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
