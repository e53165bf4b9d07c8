//! Storage backend trait and implementations.
//!
//! The migration engine only ever asks two questions of storage: "is this
//! path taken?" and "move this file over there". Both are async because they
//! are the only suspension points of a migration run.

mod local;
#[cfg(feature = "mock")]
mod mock;
mod ro;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::{MockBackend, Operation};
pub use self::ro::ReadOnlyBackend;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Unified interface for storage backends.
///
/// # Path Handling
/// All paths are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations should
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use stowage_storage::{backend::StorageBackend, error::Result};
///
/// async fn relocate(backend: &dyn StorageBackend, from: &Path, to: &Path) -> Result<bool> {
///     if backend.exists(to).await? {
///         return Ok(false);
///     }
///     backend.rename(from, to).await?;
///     Ok(true)
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend, used for logging only.
    fn name(&self) -> &str;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write file contents, creating parent directories as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Move a file within the same backend.
    ///
    /// # Notes
    /// - Implementations should create parent directories as needed.
    /// - The destination is never overwritten: an occupied destination fails
    ///   with [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists).
    /// - Either the file ends up at `to` and is gone from `from`, or an error
    ///   is returned and the file is still at `from`.
    ///
    /// ```no_run
    /// use std::path::Path;
    /// # use stowage_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// backend.rename(
    ///     Path::new("upload/user-id/IMG_0001.jpg"),
    ///     Path::new("upload/library/user-id/2023/2023-02-23/IMG_0001.jpg"),
    /// ).await?;
    /// # Ok(())
    /// # }
    /// ```
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}
