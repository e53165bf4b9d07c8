//! Collision-free destinations for rendered paths.
//!
//! A rendered path that is already taken on disk gets a numeric suffix just
//! before its extension (`name+1.ext`, `name+2.ext`, ...). Suffixes are tried
//! one at a time in increasing order against the live storage, so within a
//! sequential run every earlier move is visible to later checks.

use crate::RenderedPath;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::Path;
use stowage_catalog::models::AssetId;
use stowage_storage::StorageBackend;

/// Highest suffix tried before giving up with
/// [`DuplicatePathExhaustion`](ErrorKind::DuplicatePathExhaustion).
pub const MAX_DUPLICATE_SUFFIX: u32 = 10_000;

/// Finds the first free path for `rendered`, on behalf of asset `id`.
///
/// Returns the rendered path itself when it is free.
pub async fn resolve(backend: &dyn StorageBackend, id: &AssetId, rendered: &RenderedPath) -> Result<String> {
    let suffix = resolve_together(backend, id, &[rendered]).await?;
    Ok(rendered.with_suffix(suffix))
}

/// Finds the lowest suffix that is free for *every* path in `rendered`.
///
/// Used for live photos, where the still and the motion clip must end up
/// with the same suffix. Within one suffix the paths are checked in order,
/// stopping at the first that is taken.
pub async fn resolve_together(backend: &dyn StorageBackend, id: &AssetId, rendered: &[&RenderedPath]) -> Result<u32> {
    for suffix in 0..=MAX_DUPLICATE_SUFFIX {
        if is_free(backend, id, rendered, suffix).await? {
            if suffix > 0 {
                tracing::debug!(asset = %id, suffix, "Rendered path taken, using suffix");
            }
            return Ok(suffix);
        }
    }
    exn::bail!(ErrorKind::DuplicatePathExhaustion(id.clone()))
}

/// Whether every path in `rendered` is free with the given suffix.
pub(crate) async fn is_free(
    backend: &dyn StorageBackend,
    id: &AssetId,
    rendered: &[&RenderedPath],
    suffix: u32,
) -> Result<bool> {
    for path in rendered {
        let candidate = path.with_suffix(suffix);
        if backend.exists(Path::new(&candidate)).await.or_raise(|| ErrorKind::StorageMove(id.clone()))? {
            return Ok(false);
        }
    }
    Ok(true)
}
