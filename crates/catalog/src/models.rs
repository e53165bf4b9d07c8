//! Catalog models.
//!
//! These are the values exchanged through the [repository traits](crate::repo),
//! independent of how any particular store persists them.

use derive_more::Display;
use std::str::FromStr;
use time::OffsetDateTime;

/// Identifier of an [`Asset`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub struct AssetId(String);
impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifier of a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub struct UserId(String);
impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Broad media type of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum AssetKind {
    #[display("IMAGE")]
    Image,
    #[display("VIDEO")]
    Video,
    #[display("AUDIO")]
    Audio,
    #[display("OTHER")]
    Other,
}
impl AssetKind {
    /// Three-letter abbreviation (`IMG`, `VID`, ...).
    pub fn short_str(&self) -> &'static str {
        match self {
            Self::Image => "IMG",
            Self::Video => "VID",
            Self::Audio => "AUD",
            Self::Other => "OTH",
        }
    }
}
impl FromStr for AssetKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IMAGE" => Ok(Self::Image),
            "VIDEO" => Ok(Self::Video),
            "AUDIO" => Ok(Self::Audio),
            "OTHER" => Ok(Self::Other),
            _ => Err(()),
        }
    }
}

/// A stored media asset.
///
/// Only [`original_path`](Self::original_path) is ever written by the
/// migration engine; everything else is owned by the rest of the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub id: AssetId,
    pub owner_id: UserId,
    pub kind: AssetKind,
    /// Library-relative path of the original file.
    pub original_path: String,
    /// Name of the file as it was uploaded, if known.
    pub original_file_name: Option<String>,
    /// Capture (or file creation) time, in the offset it was taken in.
    pub file_created_at: OffsetDateTime,
    /// Read-only assets are never relocated.
    pub is_read_only: bool,
    /// For the still half of a live photo: the motion clip captured with it.
    pub live_photo_video_id: Option<AssetId>,
}
impl Asset {
    /// A writable image with no upload name and no live-photo companion.
    pub fn new(
        id: impl Into<AssetId>,
        owner_id: impl Into<UserId>,
        original_path: impl Into<String>,
        file_created_at: OffsetDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            kind: AssetKind::Image,
            original_path: original_path.into(),
            original_file_name: None,
            file_created_at,
            is_read_only: false,
            live_photo_video_id: None,
        }
    }

    pub fn with_kind(mut self, kind: AssetKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_original_file_name(mut self, name: impl Into<String>) -> Self {
        self.original_file_name = Some(name.into());
        self
    }

    pub fn with_live_photo_video(mut self, id: impl Into<AssetId>) -> Self {
        self.live_photo_video_id = Some(id.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.is_read_only = true;
        self
    }
}

/// The owner of assets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// Replaces the user ID as the owner folder name when set.
    pub storage_label: Option<String>,
    /// Soft-deleted users still own their assets until those are purged.
    pub deleted: bool,
}
impl User {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self { id: id.into(), storage_label: None, deleted: false }
    }

    pub fn with_storage_label(mut self, label: impl Into<String>) -> Self {
        self.storage_label = Some(label.into());
        self
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}

/// Filter for [`UserRepository::get_list`](crate::repo::UserRepository::get_list).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub with_deleted: bool,
}

/// Which of an asset's files a move refers to. Only originals are relocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum PathType {
    #[display("original")]
    Original,
}
impl FromStr for PathType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(Self::Original),
            _ => Err(()),
        }
    }
}

/// Audit entry for a file move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub id: i64,
    pub entity_id: AssetId,
    pub path_type: PathType,
    pub old_path: String,
    pub new_path: String,
}

/// A [`MoveRecord`] that hasn't been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMoveRecord {
    pub entity_id: AssetId,
    pub path_type: PathType,
    pub old_path: String,
    pub new_path: String,
}

/// Partial asset update: the only field the migration engine writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUpdate {
    pub id: AssetId,
    pub original_path: String,
}

/// Offset window into an ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub skip: usize,
    pub take: usize,
}
impl Pagination {
    pub fn first(take: usize) -> Self {
        Self { skip: 0, take }
    }

    /// The window following this one, given how many items this one held.
    pub fn advance(self, received: usize) -> Self {
        Self { skip: self.skip + received, take: self.take }
    }
}

/// One window of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next_page: bool,
}
