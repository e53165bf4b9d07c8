//! Path validation and manipulation for library-relative storage paths.
//!
//! Asset paths stored in the catalog are plain strings relative to the
//! library root (`upload/library/<owner>/2023/...`). Before any of them reach
//! a backend they pass through [`validate`], which keeps every operation
//! inside the root.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a storage path and returns its normalized form.
///
/// `.` components, repeated separators and a leading `/` are dropped, and
/// `..` is resolved lexically. A path that would climb above the library root,
/// contains a NUL byte, carries a Windows prefix or normalizes to nothing is
/// rejected with [`InvalidPath`](crate::error::ErrorKind::InvalidPath).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use stowage_storage::validate_path;
///
/// assert!(validate_path("upload/library/user-id/2023/IMG_0001.jpg").is_ok());
/// assert!(validate_path("upload/../IMG_0001.jpg").is_ok());
/// assert!(validate_path("../IMG_0001.jpg").is_err());
/// assert!(validate_path("upload/\0.jpg").is_err());
/// assert_eq!(
///     validate_path("/upload//library/./user-id/").unwrap(),
///     Path::new("upload/library/user-id")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(original.to_path_buf());
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(segment) => {
                // NUL survives Path::components() on Unix but truncates the
                // path once it reaches a syscall.
                if segment.as_encoded_bytes().contains(&0) {
                    exn::bail!(invalid());
                }
                components.push(segment);
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
        }
    }
    if components.is_empty() {
        exn::bail!(invalid());
    }
    Ok(components.into_iter().collect())
}

/// Splits a path into everything before the file extension and the extension
/// itself (without the dot).
///
/// Only the final segment is inspected, so dots in directory names are left
/// alone. Dotfiles (`.hidden`) and names ending in a bare dot have no
/// extension.
///
/// ```
/// use stowage_storage::split_extension;
///
/// assert_eq!(split_extension("2023/IMG_0001.jpg"), ("2023/IMG_0001", Some("jpg")));
/// assert_eq!(split_extension("2023/archive.tar.gz"), ("2023/archive.tar", Some("gz")));
/// assert_eq!(split_extension("v1.2/README"), ("v1.2/README", None));
/// ```
pub fn split_extension(path: &str) -> (&str, Option<&str>) {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[name_start..].rfind('.') {
        Some(0) | None => (path, None),
        Some(dot) if name_start + dot + 1 == path.len() => (path, None),
        Some(dot) => (&path[..name_start + dot], Some(&path[name_start + dot + 1..])),
    }
}
