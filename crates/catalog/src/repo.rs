//! Repository traits the migration engine is written against.
//!
//! Each trait covers one entity; a single store type may implement all three
//! (both [`SqliteCatalog`](crate::SqliteCatalog) and `MemoryCatalog` do).

use crate::error::Result;
use crate::models::{
    Asset, AssetId, AssetUpdate, MoveRecord, NewMoveRecord, Page, Pagination, PathType, User, UserFilter, UserId,
};
use async_trait::async_trait;
use std::sync::Arc;

pub type AssetStore = Arc<dyn AssetRepository>;
pub type UserStore = Arc<dyn UserRepository>;
pub type MoveStore = Arc<dyn MoveRepository>;

#[async_trait]
pub trait AssetRepository: Send + Sync {
    /// One page of all assets, in a stable order that does not depend on
    /// `original_path` (so rewriting paths mid-listing can't reshuffle pages).
    async fn get_all(&self, pagination: Pagination) -> Result<Page<Asset>>;

    /// Assets with the given IDs, in the order requested. Unknown IDs are
    /// left out.
    async fn get_by_ids(&self, ids: &[AssetId]) -> Result<Vec<Asset>>;

    /// Applies a partial update and returns the updated asset.
    ///
    /// Returns [`AssetNotFound`](crate::error::ErrorKind::AssetNotFound) if
    /// the asset doesn't exist.
    async fn save(&self, update: AssetUpdate) -> Result<Asset>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, id: &UserId) -> Result<Option<User>>;

    async fn get_list(&self, filter: UserFilter) -> Result<Vec<User>>;
}

/// Durable history of file moves, used to reconstruct (and reverse) what a
/// migration run did.
#[async_trait]
pub trait MoveRepository: Send + Sync {
    async fn create(&self, record: NewMoveRecord) -> Result<MoveRecord>;

    /// Removes a record whose move never happened (or was undone).
    async fn delete(&self, id: i64) -> Result<()>;

    /// Every recorded move of one of an entity's files, oldest first.
    async fn get_by_entity(&self, entity_id: &AssetId, path_type: PathType) -> Result<Vec<MoveRecord>>;
}
