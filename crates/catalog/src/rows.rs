//! Row types mapping SQLite columns to catalog models.

use crate::error::{Error, ErrorKind};
use crate::models::{Asset, AssetId, AssetKind, MoveRecord, PathType, User, UserId};
use exn::{OptionExt, ResultExt};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(sqlx::FromRow)]
pub(crate) struct AssetRow {
    pub(crate) id: String,
    pub(crate) owner_id: String,
    pub(crate) kind: String,
    pub(crate) original_path: String,
    pub(crate) original_file_name: Option<String>,
    pub(crate) file_created_at: String,
    pub(crate) is_read_only: bool,
    pub(crate) live_photo_video_id: Option<String>,
}
impl TryFrom<&Asset> for AssetRow {
    type Error = Error;
    fn try_from(asset: &Asset) -> Result<Self, Self::Error> {
        Ok(Self {
            id: asset.id.to_string(),
            owner_id: asset.owner_id.to_string(),
            kind: asset.kind.to_string(),
            original_path: asset.original_path.clone(),
            original_file_name: asset.original_file_name.clone(),
            file_created_at: asset.file_created_at.format(&Rfc3339).or_raise(|| ErrorKind::InvalidData("creation date"))?,
            is_read_only: asset.is_read_only,
            live_photo_video_id: asset.live_photo_video_id.as_ref().map(AssetId::to_string),
        })
    }
}
impl TryFrom<AssetRow> for Asset {
    type Error = Error;
    fn try_from(row: AssetRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: AssetId::new(row.id),
            owner_id: UserId::new(row.owner_id),
            kind: row.kind.parse::<AssetKind>().ok().ok_or_raise(|| ErrorKind::InvalidData("asset kind"))?,
            original_path: row.original_path,
            original_file_name: row.original_file_name,
            file_created_at: OffsetDateTime::parse(&row.file_created_at, &Rfc3339)
                .or_raise(|| ErrorKind::InvalidData("creation date"))?,
            is_read_only: row.is_read_only,
            live_photo_video_id: row.live_photo_video_id.map(AssetId::new),
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct UserRow {
    id: String,
    storage_label: Option<String>,
    deleted: bool,
}
impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self { id: UserId::new(row.id), storage_label: row.storage_label, deleted: row.deleted }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct MoveRow {
    id: i64,
    entity_id: String,
    path_type: String,
    old_path: String,
    new_path: String,
}
impl TryFrom<MoveRow> for MoveRecord {
    type Error = Error;
    fn try_from(row: MoveRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            entity_id: AssetId::new(row.entity_id),
            path_type: row.path_type.parse::<PathType>().ok().ok_or_raise(|| ErrorKind::InvalidData("path type"))?,
            old_path: row.old_path,
            new_path: row.new_path,
        })
    }
}
