//! In-memory catalog for testing.

use crate::error::{ErrorKind, Result};
use crate::models::{
    Asset, AssetId, AssetUpdate, MoveRecord, NewMoveRecord, Page, Pagination, PathType, User, UserFilter, UserId,
};
use crate::repo::{AssetRepository, MoveRepository, UserRepository};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

/// In-memory catalog implementing every repository trait.
///
/// Assets are listed in insertion order. Besides storing data it records
/// every [`save`](AssetRepository::save) and
/// [`get_all`](AssetRepository::get_all) call, so tests can assert that a
/// migration did (or didn't) touch the catalog.
///
/// ```
/// use std::sync::Arc;
/// use stowage_catalog::{AssetStore, MemoryCatalog, UserStore};
/// use stowage_catalog::models::User;
///
/// let catalog = Arc::new(MemoryCatalog::default().with_users([User::new("user-id")]));
/// let users: UserStore = catalog.clone();
/// let assets: AssetStore = catalog;
/// ```
#[derive(Default)]
pub struct MemoryCatalog {
    assets: RwLock<Vec<Asset>>,
    users: RwLock<Vec<User>>,
    moves: RwLock<Vec<MoveRecord>>,
    saves: RwLock<Vec<AssetUpdate>>,
    get_all_calls: RwLock<Vec<Pagination>>,
    failing_saves: HashSet<AssetId>,
    last_move_id: AtomicI64,
}

impl MemoryCatalog {
    pub fn with_assets(mut self, assets: impl IntoIterator<Item = Asset>) -> Self {
        self.assets.get_mut().extend(assets);
        self
    }

    pub fn with_users(mut self, users: impl IntoIterator<Item = User>) -> Self {
        self.users.get_mut().extend(users);
        self
    }

    /// Make every `save` of this asset fail with a database error.
    pub fn with_failing_save(mut self, id: impl Into<AssetId>) -> Self {
        self.failing_saves.insert(id.into());
        self
    }

    /// Every `save` call that succeeded, in call order.
    pub async fn saves(&self) -> Vec<AssetUpdate> {
        self.saves.read().await.clone()
    }

    /// The window of every `get_all` call, in call order.
    pub async fn get_all_calls(&self) -> Vec<Pagination> {
        self.get_all_calls.read().await.clone()
    }

    /// Every stored move record, in creation order.
    pub async fn moves(&self) -> Vec<MoveRecord> {
        self.moves.read().await.clone()
    }

    /// Current state of one asset.
    pub async fn asset(&self, id: impl Into<AssetId>) -> Option<Asset> {
        let id = id.into();
        self.assets.read().await.iter().find(|a| a.id == id).cloned()
    }
}

#[async_trait]
impl AssetRepository for MemoryCatalog {
    async fn get_all(&self, pagination: Pagination) -> Result<Page<Asset>> {
        self.get_all_calls.write().await.push(pagination);
        let assets = self.assets.read().await;
        let items: Vec<Asset> = assets.iter().skip(pagination.skip).take(pagination.take).cloned().collect();
        let has_next_page = pagination.skip + items.len() < assets.len();
        Ok(Page { items, has_next_page })
    }

    async fn get_by_ids(&self, ids: &[AssetId]) -> Result<Vec<Asset>> {
        let assets = self.assets.read().await;
        Ok(ids.iter().filter_map(|id| assets.iter().find(|a| &a.id == id).cloned()).collect())
    }

    async fn save(&self, update: AssetUpdate) -> Result<Asset> {
        if self.failing_saves.contains(&update.id) {
            exn::bail!(ErrorKind::Database);
        }
        let mut assets = self.assets.write().await;
        let Some(asset) = assets.iter_mut().find(|a| a.id == update.id) else {
            exn::bail!(ErrorKind::AssetNotFound(update.id));
        };
        asset.original_path = update.original_path.clone();
        let saved = asset.clone();
        self.saves.write().await.push(update);
        Ok(saved)
    }
}

#[async_trait]
impl UserRepository for MemoryCatalog {
    async fn get(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| &u.id == id).cloned())
    }

    async fn get_list(&self, filter: UserFilter) -> Result<Vec<User>> {
        let users = self.users.read().await;
        Ok(users.iter().filter(|u| filter.with_deleted || !u.deleted).cloned().collect())
    }
}

#[async_trait]
impl MoveRepository for MemoryCatalog {
    async fn create(&self, record: NewMoveRecord) -> Result<MoveRecord> {
        let id = self.last_move_id.fetch_add(1, Ordering::Relaxed) + 1;
        let created = MoveRecord {
            id,
            entity_id: record.entity_id,
            path_type: record.path_type,
            old_path: record.old_path,
            new_path: record.new_path,
        };
        self.moves.write().await.push(created.clone());
        Ok(created)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.moves.write().await.retain(|m| m.id != id);
        Ok(())
    }

    async fn get_by_entity(&self, entity_id: &AssetId, path_type: PathType) -> Result<Vec<MoveRecord>> {
        let moves = self.moves.read().await;
        Ok(moves.iter().filter(|m| &m.entity_id == entity_id && m.path_type == path_type).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[tokio::test]
    async fn test_save_updates_and_records() {
        let catalog = MemoryCatalog::default().with_assets([Asset::new(
            "asset-id",
            "user-id",
            "old.jpg",
            datetime!(2023-02-23 0:00 UTC),
        )]);
        let update = AssetUpdate { id: AssetId::new("asset-id"), original_path: "new.jpg".to_string() };
        let saved = catalog.save(update.clone()).await.unwrap();
        assert_eq!(saved.original_path, "new.jpg");
        assert_eq!(catalog.saves().await, vec![update]);
    }

    #[tokio::test]
    async fn test_failing_save_leaves_asset_alone() {
        let catalog = MemoryCatalog::default()
            .with_assets([Asset::new("asset-id", "user-id", "old.jpg", datetime!(2023-02-23 0:00 UTC))])
            .with_failing_save("asset-id");
        let update = AssetUpdate { id: AssetId::new("asset-id"), original_path: "new.jpg".to_string() };
        assert!(catalog.save(update).await.is_err());
        assert_eq!(catalog.asset("asset-id").await.unwrap().original_path, "old.jpg");
        assert!(catalog.saves().await.is_empty());
    }

    #[tokio::test]
    async fn test_user_list_filters_deleted() {
        let catalog = MemoryCatalog::default().with_users([User::new("active"), User::new("gone").deleted()]);
        assert_eq!(catalog.get_list(UserFilter::default()).await.unwrap().len(), 1);
        assert_eq!(catalog.get_list(UserFilter { with_deleted: true }).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_move_ids_increase() {
        let catalog = MemoryCatalog::default();
        let record = |old: &str| NewMoveRecord {
            entity_id: AssetId::new("asset-id"),
            path_type: PathType::Original,
            old_path: old.to_string(),
            new_path: "new.jpg".to_string(),
        };
        let first = catalog.create(record("a.jpg")).await.unwrap();
        let second = catalog.create(record("b.jpg")).await.unwrap();
        assert!(second.id > first.id);
        catalog.delete(first.id).await.unwrap();
        let remaining = catalog.get_by_entity(&AssetId::new("asset-id"), PathType::Original).await.unwrap();
        assert_eq!(remaining, vec![second]);
    }
}
