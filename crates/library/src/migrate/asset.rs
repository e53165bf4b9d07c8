use super::{Action, Migrator};
use crate::RenderedPath;
use crate::error::{ErrorKind, Result};
use crate::plan::{Plan, classify};
use crate::resolve::{is_free, resolve_together};
use exn::ResultExt;
use std::path::Path;
use stowage_catalog::models::{Asset, AssetId, AssetUpdate, MoveRecord, NewMoveRecord, PathType, User};
use tracing::instrument;

impl Migrator {
    /// Migrates an asset together with its live-photo companion (if any),
    /// returning one result per member.
    ///
    /// Members that have to move share one disambiguation suffix. When one
    /// member is already settled at its rendered path (suffixed or not), the
    /// others first try the suffix it carries. A member whose path can't be
    /// rendered fails on its own and the rest of the group carries on.
    pub(super) async fn migrate_group(&self, owner: &User, members: Vec<Asset>) -> Vec<(AssetId, Result<Action>)> {
        let mut results = Vec::with_capacity(members.len());
        let mut renderable = Vec::with_capacity(members.len());
        let mut rendered = Vec::with_capacity(members.len());
        for asset in members {
            match self.paths.render(&asset, owner) {
                Ok(path) => {
                    renderable.push(asset);
                    rendered.push(path);
                },
                // Configuration errors abort the run; no point in going on.
                Err(e) if e.is_fatal() => return vec![(asset.id, Err(e))],
                Err(e) => {
                    tracing::warn!(asset = %asset.id, error = ?e, "Could not render storage path");
                    results.push((asset.id, Err(e)));
                },
            }
        }
        let members = renderable;
        let plans: Vec<Option<Plan>> = members.iter().zip(&rendered).map(|(a, r)| classify(a, r)).collect();

        let moving: Vec<&RenderedPath> =
            plans.iter().zip(&rendered).filter(|(plan, _)| plan.is_none()).map(|(_, r)| r).collect();
        let mut suffix = None;
        if let Some(first) = members.iter().zip(&plans).find(|(_, plan)| plan.is_none()).map(|(a, _)| &a.id) {
            let settled = members.iter().zip(&rendered).zip(&plans).find_map(|((asset, rendered), plan)| {
                match plan {
                    Some(Plan::NoOp | Plan::SkipProbableDuplicate) => rendered.suffix_of(&asset.original_path),
                    _ => None,
                }
            });
            suffix = Some(self.choose_suffix(first, &moving, settled).await);
        }

        // Kind of a shared suffix failure, raised again for every later mover.
        let mut unresolved: Option<fn(AssetId) -> ErrorKind> = None;
        for ((asset, rendered), plan) in members.iter().zip(&rendered).zip(plans) {
            let result = match plan {
                Some(Plan::NoOp) => {
                    tracing::debug!(asset = %asset.id, path = %asset.original_path, "Asset already at rendered path");
                    Ok(Action::Unchanged)
                },
                Some(Plan::SkipReadOnly) => {
                    tracing::debug!(asset = %asset.id, "Skipping read-only asset");
                    Ok(Action::SkippedReadOnly)
                },
                Some(Plan::SkipProbableDuplicate) => {
                    tracing::debug!(asset = %asset.id, path = %asset.original_path, "Skipping probable duplicate");
                    Ok(Action::SkippedDuplicate)
                },
                Some(Plan::Move(to)) => self.relocate(asset, to).await,
                None => match suffix.take() {
                    Some(Ok(n)) => {
                        suffix = Some(Ok(n));
                        self.relocate(asset, rendered.with_suffix(n)).await
                    },
                    Some(Err(e)) => {
                        unresolved = Some(shared_failure(&e));
                        Err(e)
                    },
                    None => Err(exn::Exn::from(unresolved.unwrap_or(ErrorKind::StorageMove)(asset.id.clone()))),
                },
            };
            results.push((asset.id.clone(), result));
        }
        results
    }

    async fn choose_suffix(&self, id: &AssetId, moving: &[&RenderedPath], preferred: Option<u32>) -> Result<u32> {
        if let Some(n) = preferred
            && is_free(&*self.storage, id, moving, n).await?
        {
            return Ok(n);
        }
        resolve_together(&*self.storage, id, moving).await
    }

    /// Moves one file and points the catalog at its new location.
    ///
    /// The move record is written first. If the file can't be moved the record
    /// is deleted again and the asset keeps its old path. If the catalog can't
    /// be updated the file is moved back; only when that also fails does the
    /// record stay, pointing at where the file really is.
    #[instrument(skip_all, fields(asset = %asset.id))]
    async fn relocate(&self, asset: &Asset, to: String) -> Result<Action> {
        let id = &asset.id;
        let from = asset.original_path.clone();
        let record = self
            .moves
            .create(NewMoveRecord {
                entity_id: id.clone(),
                path_type: PathType::Original,
                old_path: from.clone(),
                new_path: to.clone(),
            })
            .await
            .or_raise(|| ErrorKind::Catalog(id.clone()))?;

        if let Err(e) = self.storage.rename(Path::new(&from), Path::new(&to)).await {
            self.forget(&record).await;
            return Err(e).or_raise(|| ErrorKind::StorageMove(id.clone()));
        }
        if let Err(e) = self.assets.save(AssetUpdate { id: id.clone(), original_path: to.clone() }).await {
            match self.storage.rename(Path::new(&to), Path::new(&from)).await {
                Ok(()) => self.forget(&record).await,
                Err(rollback) => tracing::error!(
                    asset = %id,
                    path = %to,
                    record = record.id,
                    error = ?rollback,
                    "Could not move file back after catalog update failed"
                ),
            }
            return Err(e).or_raise(|| ErrorKind::Catalog(id.clone()));
        }

        tracing::info!(asset = %id, %from, %to, "Moved asset");
        Ok(Action::Moved { from, to })
    }

    async fn forget(&self, record: &MoveRecord) {
        if let Err(e) = self.moves.delete(record.id).await {
            tracing::warn!(record = record.id, error = ?e, "Could not delete move record");
        }
    }
}

/// The same failure as `error`, for another member of the group.
fn shared_failure(error: &ErrorKind) -> fn(AssetId) -> ErrorKind {
    match error {
        ErrorKind::DuplicatePathExhaustion(_) => ErrorKind::DuplicatePathExhaustion,
        _ => ErrorKind::StorageMove,
    }
}
