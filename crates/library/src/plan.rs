//! Per-asset migration decisions.

use crate::RenderedPath;
use crate::error::Result;
use crate::resolve::resolve;
use stowage_catalog::models::Asset;
use stowage_storage::StorageBackend;
use tracing::instrument;

/// What should happen to a single asset's original file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Already at its rendered path.
    NoOp,
    /// Move to this (free) path.
    Move(String),
    /// Read-only assets are never relocated, even when misplaced.
    SkipReadOnly,
    /// Already at the rendered path with a disambiguation suffix, presumably
    /// put there by an earlier run to resolve a collision.
    SkipProbableDuplicate,
}

/// Decides everything that doesn't need storage. Rules are applied in order,
/// first match wins:
///
/// 1. read-only asset: [`Plan::SkipReadOnly`]
/// 2. current path equals the rendered path: [`Plan::NoOp`]
/// 3. current path is the rendered path plus a suffix: [`Plan::SkipProbableDuplicate`]
///
/// Returns `None` when the asset has to move.
pub fn classify(asset: &Asset, rendered: &RenderedPath) -> Option<Plan> {
    if asset.is_read_only {
        return Some(Plan::SkipReadOnly);
    }
    match rendered.suffix_of(&asset.original_path)? {
        0 => Some(Plan::NoOp),
        _ => Some(Plan::SkipProbableDuplicate),
    }
}

/// [`classify`], then resolve a free destination against the live storage
/// for assets that have to move.
#[instrument(skip_all, fields(asset = %asset.id))]
pub async fn plan(backend: &dyn StorageBackend, asset: &Asset, rendered: &RenderedPath) -> Result<Plan> {
    if let Some(plan) = classify(asset, rendered) {
        return Ok(plan);
    }
    resolve(backend, &asset.id, rendered).await.map(Plan::Move)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use stowage_storage::backend::MockBackend;
    use time::macros::datetime;

    const RENDERED: &str = "upload/library/user-id/2023/2023-02-23/asset-id";

    fn asset(path: &str) -> Asset {
        Asset::new("asset-id", "user-id", path, datetime!(2023-02-23 12:00 UTC))
    }

    #[rstest]
    #[case(asset("upload/library/user-id/2023/2023-02-23/asset-id.jpg"), Some(Plan::NoOp))]
    #[case(asset("upload/library/user-id/2023/2023-02-23/asset-id+1.jpg"), Some(Plan::SkipProbableDuplicate))]
    #[case(asset("/upload/library/user-id/2023/2023-02-23/asset-id.jpg"), Some(Plan::NoOp))]
    #[case(asset("./upload/library/user-id/2023/2023-02-23/asset-id+2.jpg"), Some(Plan::SkipProbableDuplicate))]
    #[case(asset("/original/asset-id.jpg").read_only(), Some(Plan::SkipReadOnly))]
    #[case(asset("upload/library/user-id/2023/2023-02-23/asset-id.jpg").read_only(), Some(Plan::SkipReadOnly))]
    #[case(asset("/original/asset-id.jpg"), None)]
    #[case(asset("upload/library/user-id/2023/2023-02-23/asset-id+1.png"), None)]
    fn test_classify(#[case] asset: Asset, #[case] expected: Option<Plan>) {
        assert_eq!(classify(&asset, &RenderedPath::new(RENDERED, Some("jpg"))), expected);
    }

    #[tokio::test]
    async fn test_skips_touch_no_storage() {
        let backend = MockBackend::default();
        let rendered = RenderedPath::new(RENDERED, Some("jpg"));
        let plan = plan(&backend, &asset("/original/asset-id.jpg").read_only(), &rendered).await.unwrap();
        assert_eq!(plan, Plan::SkipReadOnly);
        assert!(backend.operations().await.is_empty());
    }

    #[tokio::test]
    async fn test_moves_to_resolved_path() {
        let backend = MockBackend::with_files([(format!("{RENDERED}.jpg"), b"other")]);
        let rendered = RenderedPath::new(RENDERED, Some("jpg"));
        let plan = plan(&backend, &asset("/original/asset-id.jpg"), &rendered).await.unwrap();
        assert_eq!(plan, Plan::Move(format!("{RENDERED}+1.jpg")));
        assert_eq!(backend.exists_calls().await, 2);
    }
}
