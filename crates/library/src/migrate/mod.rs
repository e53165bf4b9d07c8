//! Relocating asset files to their rendered paths.
//!
//! A [`Migrator`] owns everything a migration run needs: the three catalog
//! repositories, the storage backend and the [`PathGenerator`]. It offers two
//! entry points:
//!
//! - [`Migrator::handle_migration_single`] for one asset (and its live-photo
//!   companion), e.g. right after upload.
//! - [`Migrator::migrate`] / [`Migrator::handle_migration`] for the whole
//!   catalog, e.g. after the template changed.
//!
//! Assets are processed strictly one after another: a move made for one asset
//! must be visible to the collision checks of the next.

mod asset;
mod stream;

pub use self::stream::{MigrationEvent, MigrationReport};
use crate::PathGenerator;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use stowage_catalog::models::{Asset, AssetId};
use stowage_catalog::{AssetStore, MoveStore, UserStore};
use stowage_config::{Config, DEFAULT_PAGE_SIZE};
use stowage_storage::BackendHandle;
use tracing::instrument;

/// The outcome of (successfully) migrating a single asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// The file was moved and the catalog updated.
    Moved { from: String, to: String },
    /// Already at its rendered path.
    Unchanged,
    SkippedReadOnly,
    /// Already at a suffixed version of its rendered path.
    SkippedDuplicate,
}

/// Moves asset files to the paths their storage template renders to.
pub struct Migrator {
    assets: AssetStore,
    users: UserStore,
    moves: MoveStore,
    storage: BackendHandle,
    paths: PathGenerator,
    page_size: usize,
}

impl Migrator {
    pub fn new(
        assets: AssetStore,
        users: UserStore,
        moves: MoveStore,
        storage: BackendHandle,
        paths: PathGenerator,
    ) -> Self {
        Self { assets, users, moves, storage, paths, page_size: DEFAULT_PAGE_SIZE }
    }

    /// Builds a migrator for the active template and page size of `config`.
    pub fn from_config(
        config: &Config,
        assets: AssetStore,
        users: UserStore,
        moves: MoveStore,
        storage: BackendHandle,
    ) -> Result<Self> {
        let paths = PathGenerator::from_config(&config.template)?;
        Ok(Self::new(assets, users, moves, storage, paths).with_page_size(config.migration.page_size))
    }

    /// Number of assets requested from the catalog per page (at least one).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Migrates one asset, and its live-photo companion if it has one.
    ///
    /// Returns `Ok(false)` when the asset or its owner can't be found, or when
    /// moving either file failed (logged, catalog left consistent). Only
    /// configuration errors are returned as `Err`.
    #[instrument(skip(self))]
    pub async fn handle_migration_single(&self, id: &AssetId) -> Result<bool> {
        let Some(asset) = self.load(id).await else {
            return Ok(false);
        };
        let owner = match self.users.get(&asset.owner_id).await {
            Ok(Some(owner)) => owner,
            Ok(None) => {
                tracing::warn!(asset = %id, owner = %asset.owner_id, "Asset owner not found");
                return Ok(false);
            },
            Err(e) => {
                tracing::warn!(asset = %id, error = ?e, "Could not load asset owner");
                return Ok(false);
            },
        };
        let mut members = vec![asset];
        if let Some(companion) = members[0].live_photo_video_id.clone() {
            match self.load(&companion).await {
                Some(video) => members.push(video),
                None => tracing::warn!(asset = %id, %companion, "Live photo video not found, migrating still alone"),
            }
        }

        let mut success = true;
        for (member, result) in self.migrate_group(&owner, members).await {
            match result {
                Ok(action) => tracing::debug!(asset = %member, ?action, "Asset migrated"),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(asset = %member, error = ?e, "Asset migration failed");
                    success = false;
                },
            }
        }
        Ok(success)
    }

    async fn load(&self, id: &AssetId) -> Option<Asset> {
        match self.assets.get_by_ids(std::slice::from_ref(id)).await.or_raise(|| ErrorKind::Catalog(id.clone())) {
            Ok(found) => {
                let asset = found.into_iter().next();
                if asset.is_none() {
                    tracing::warn!(asset = %id, "Asset not found");
                }
                asset
            },
            Err(e) => {
                tracing::warn!(asset = %id, error = ?e, "Could not load asset");
                None
            },
        }
    }
}
