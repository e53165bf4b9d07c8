//! Repository implementations on top of the SQLite [`Database`].

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{
    Asset, AssetId, AssetUpdate, MoveRecord, NewMoveRecord, Page, Pagination, PathType, User, UserFilter, UserId,
};
use crate::repo::{AssetRepository, MoveRepository, UserRepository};
use crate::rows::{AssetRow, MoveRow, UserRow};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const ASSET_COLUMNS: &str =
    "id, owner_id, kind, original_path, original_file_name, file_created_at, is_read_only, live_photo_video_id";

/// SQLite-backed catalog implementing every repository trait.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}
impl From<&Database> for SqliteCatalog {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a user, or update an existing one with the same ID.
    pub async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query(include_str!("../queries/upsert_user.sql"))
            .bind(user.id.as_str())
            .bind(user.storage_label.as_deref())
            .bind(user.deleted)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Insert an asset, or replace an existing one with the same ID. The owner
    /// (and any live-photo companion) must already exist.
    pub async fn insert_asset(&self, asset: &Asset) -> Result<()> {
        let row = AssetRow::try_from(asset)?;
        sqlx::query(include_str!("../queries/upsert_asset.sql"))
            .bind(row.id)
            .bind(row.owner_id)
            .bind(row.kind)
            .bind(row.original_path)
            .bind(row.original_file_name)
            .bind(row.file_created_at)
            .bind(row.is_read_only)
            .bind(row.live_photo_video_id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    fn limit(value: usize) -> Result<i64> {
        i64::try_from(value).or_raise(|| ErrorKind::InvalidData("pagination"))
    }
}

#[async_trait]
impl AssetRepository for SqliteCatalog {
    async fn get_all(&self, pagination: Pagination) -> Result<Page<Asset>> {
        // Ask for one extra row to learn whether another page follows.
        let rows: Vec<AssetRow> = sqlx::query_as(include_str!("../queries/list_assets.sql"))
            .bind(Self::limit(pagination.take.saturating_add(1))?)
            .bind(Self::limit(pagination.skip)?)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let has_next_page = rows.len() > pagination.take;
        let items = rows.into_iter().take(pagination.take).map(Asset::try_from).collect::<Result<Vec<_>>>()?;
        Ok(Page { items, has_next_page })
    }

    async fn get_by_ids(&self, ids: &[AssetId]) -> Result<Vec<Asset>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {ASSET_COLUMNS} FROM assets WHERE id IN ("));
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");
        let rows: Vec<AssetRow> =
            query.build_query_as().fetch_all(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        let mut assets = rows.into_iter().map(Asset::try_from).collect::<Result<Vec<_>>>()?;
        assets.sort_by_key(|asset| ids.iter().position(|id| id == &asset.id));
        Ok(assets)
    }

    async fn save(&self, update: AssetUpdate) -> Result<Asset> {
        let row: Option<AssetRow> = sqlx::query_as(include_str!("../queries/update_asset_path.sql"))
            .bind(&update.original_path)
            .bind(update.id.as_str())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        match row {
            Some(row) => Asset::try_from(row),
            None => exn::bail!(ErrorKind::AssetNotFound(update.id)),
        }
    }
}

#[async_trait]
impl UserRepository for SqliteCatalog {
    async fn get(&self, id: &UserId) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT id, storage_label, deleted FROM users WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.map(User::from))
    }

    async fn get_list(&self, filter: UserFilter) -> Result<Vec<User>> {
        let rows: Vec<UserRow> =
            sqlx::query_as("SELECT id, storage_label, deleted FROM users WHERE deleted = 0 OR ? ORDER BY id")
                .bind(filter.with_deleted)
                .fetch_all(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}

#[async_trait]
impl MoveRepository for SqliteCatalog {
    async fn create(&self, record: NewMoveRecord) -> Result<MoveRecord> {
        let row: MoveRow = sqlx::query_as(include_str!("../queries/insert_move.sql"))
            .bind(record.entity_id.as_str())
            .bind(record.path_type.to_string())
            .bind(&record.old_path)
            .bind(&record.new_path)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        MoveRecord::try_from(row)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM move_history WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn get_by_entity(&self, entity_id: &AssetId, path_type: PathType) -> Result<Vec<MoveRecord>> {
        let rows: Vec<MoveRow> = sqlx::query_as(include_str!("../queries/moves_for_entity.sql"))
            .bind(entity_id.as_str())
            .bind(path_type.to_string())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(MoveRecord::try_from).collect()
    }
}
