//! In-memory storage backend for testing.

use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// A boundary call observed by a [`MockBackend`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Exists(PathBuf),
    Rename(PathBuf, PathBuf),
}

/// In-memory storage backend for testing.
///
/// Files are stored in a `HashMap` behind a [`RwLock`]. Every `exists` and
/// `rename` call is recorded (after path validation) so tests can assert on
/// exactly which boundary calls a migration made.
///
/// # Examples
///
/// ```
/// use stowage_storage::backend::{MockBackend, Operation, StorageBackend};
/// use std::path::{Path, PathBuf};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([("upload/asset.jpg", b"jpeg")]);
/// assert!(backend.exists(Path::new("upload/asset.jpg")).await?);
/// assert_eq!(
///     backend.operations().await,
///     vec![Operation::Exists(PathBuf::from("upload/asset.jpg"))],
/// );
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, Vec<u8>>>,
    operations: RwLock<Vec<Operation>>,
    read_only: bool,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation. If test setup is wrong, then test
    /// should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, data.into());
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            operations: RwLock::new(Vec::new()),
            read_only: false,
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every mutating call fail with [`ErrorKind::ReadOnly`]. Renames are
    /// still recorded before failing.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Boundary calls made so far.
    pub async fn operations(&self) -> Vec<Operation> {
        self.operations.read().await.clone()
    }

    /// Only the `rename` calls made so far, as `(from, to)` pairs.
    pub async fn renames(&self) -> Vec<(PathBuf, PathBuf)> {
        self.operations
            .read()
            .await
            .iter()
            .filter_map(|op| match op {
                Operation::Rename(from, to) => Some((from.clone(), to.clone())),
                Operation::Exists(_) => None,
            })
            .collect()
    }

    /// Number of `exists` calls made so far.
    pub async fn exists_calls(&self) -> usize {
        self.operations.read().await.iter().filter(|op| matches!(op, Operation::Exists(_))).count()
    }

    /// Paths of every stored file, sorted.
    pub async fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.storage.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        self.operations.write().await.push(Operation::Exists(path.clone()));
        Ok(self.storage.read().await.contains_key(&path))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let data = self.storage.read().await.get(&path).cloned();
        data.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        if self.read_only {
            exn::bail!(ErrorKind::ReadOnly(path));
        }
        self.storage.write().await.insert(path, data.to_vec());
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        if self.read_only {
            exn::bail!(ErrorKind::ReadOnly(path));
        }
        self.storage.write().await.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        self.operations.write().await.push(Operation::Rename(from.clone(), to.clone()));
        if self.read_only {
            exn::bail!(ErrorKind::ReadOnly(to));
        }
        let mut guard = self.storage.write().await;
        if guard.contains_key(&to) {
            exn::bail!(ErrorKind::AlreadyExists(to));
        }
        let data = guard.remove(&from).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(from)))?;
        guard.insert(to, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rename_moves_data() {
        let backend = MockBackend::with_files([("old.jpg", b"jpeg")]);
        backend.rename(Path::new("old.jpg"), Path::new("a/new.jpg")).await.unwrap();
        assert_eq!(backend.paths().await, vec![PathBuf::from("a/new.jpg")]);
        assert_eq!(backend.read(Path::new("a/new.jpg")).await.unwrap(), b"jpeg");
    }

    #[tokio::test]
    async fn test_rename_refuses_occupied_destination() {
        let backend = MockBackend::with_files([("a.jpg", b"a"), ("b.jpg", b"b")]);
        let err = backend.rename(Path::new("a.jpg"), Path::new("b.jpg")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));
        assert_eq!(backend.read(Path::new("b.jpg")).await.unwrap(), b"b");
    }

    #[tokio::test]
    async fn test_read_only_records_then_fails() {
        let backend = MockBackend::with_files([("a.jpg", b"a")]).read_only();
        let err = backend.rename(Path::new("a.jpg"), Path::new("b.jpg")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::ReadOnly(_)));
        assert_eq!(backend.renames().await, vec![(PathBuf::from("a.jpg"), PathBuf::from("b.jpg"))]);
        assert!(backend.exists(Path::new("a.jpg")).await.unwrap());
    }

    #[tokio::test]
    async fn test_records_exists_calls_in_order() {
        let backend = MockBackend::default();
        backend.exists(Path::new("one.jpg")).await.unwrap();
        backend.exists(Path::new("/two.jpg")).await.unwrap();
        assert_eq!(
            backend.operations().await,
            vec![Operation::Exists(PathBuf::from("one.jpg")), Operation::Exists(PathBuf::from("two.jpg"))]
        );
        assert_eq!(backend.exists_calls().await, 2);
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_files_panics_on_bad_path() {
        MockBackend::with_files([("../escape", Vec::from(*b"bad"))]);
    }
}
