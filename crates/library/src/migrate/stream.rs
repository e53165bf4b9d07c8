use super::{Action, Migrator};
use crate::error::{ErrorKind, Result};
use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use std::collections::{HashMap, HashSet};
use stowage_catalog::models::{AssetId, User, UserFilter, UserId};
use stowage_catalog::paginate;
use tracing::instrument;

/// Progress events emitted by [`Migrator::migrate`] as it works through the
/// catalog.
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started): exactly once.
/// 2. [`PageLoaded`](Self::PageLoaded): once per page of assets, each followed
///    by one [`Migrated`](Self::Migrated) per asset of that page (plus any
///    live-photo companions migrated along with them).
/// 3. [`Complete`](Self::Complete): exactly once, signalling the stream is
///    finished.
///
/// A fatal error terminates the stream early, in which case
/// [`Complete`](Self::Complete) is never emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationEvent {
    Started,
    /// Another page of assets was fetched; carries its size.
    PageLoaded(usize),
    Migrated { asset: AssetId, action: Action },
    Complete,
}

/// Tally of a finished migration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub moved: usize,
    pub unchanged: usize,
    pub skipped_read_only: usize,
    pub skipped_duplicate: usize,
    pub failed: usize,
}
impl MigrationReport {
    fn record(&mut self, action: &Action) {
        match action {
            Action::Moved { .. } => self.moved += 1,
            Action::Unchanged => self.unchanged += 1,
            Action::SkippedReadOnly => self.skipped_read_only += 1,
            Action::SkippedDuplicate => self.skipped_duplicate += 1,
        }
    }
}

impl Migrator {
    /// Streams [`MigrationEvent`]s while migrating every asset in the catalog.
    ///
    /// The owner list is loaded once up front (including soft-deleted users,
    /// who still own files); assets are then pulled one page at a time so the
    /// catalog is never held in memory. Assets are migrated one after another.
    ///
    /// Individual asset failures are surfaced as `Err` items without
    /// terminating the stream. Only [fatal](ErrorKind::is_fatal) errors end it.
    pub fn migrate(&self) -> impl Stream<Item = Result<MigrationEvent>> + '_ {
        // `rustfmt` does not format macros that use braces. Wrap in parentheses!
        stream!({
            yield Ok(MigrationEvent::Started);

            let owners: HashMap<UserId, User> =
                match self.users.get_list(UserFilter { with_deleted: true }).await.or_raise(|| ErrorKind::Discovery) {
                    Ok(users) => users.into_iter().map(|user| (user.id.clone(), user)).collect(),
                    Err(e) => {
                        yield Err(e);
                        return;
                    },
                };

            // Companions migrate with their still, wherever either shows up in
            // the listing; each asset is reported once.
            let mut visited: HashSet<AssetId> = HashSet::new();
            for await page in paginate(self.assets.as_ref(), self.page_size) {
                let page = match page.or_raise(|| ErrorKind::Discovery) {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(e);
                        return;
                    },
                };
                yield Ok(MigrationEvent::PageLoaded(page.len()));

                for asset in page {
                    let primary = asset.id.clone();
                    if !visited.insert(primary.clone()) {
                        continue;
                    }
                    let Some(owner) = owners.get(&asset.owner_id) else {
                        tracing::warn!(asset = %primary, owner = %asset.owner_id, "Asset owner not found");
                        yield Err(exn::Exn::from(ErrorKind::UserResolution(primary)));
                        continue;
                    };
                    let mut members = vec![asset];
                    if let Some(companion) = members[0].live_photo_video_id.clone() {
                        if let Some(video) = self.load(&companion).await {
                            members.push(video);
                        }
                    }

                    for (member, result) in self.migrate_group(owner, members).await {
                        let reported = member != primary && !visited.insert(member.clone());
                        if reported && !matches!(result, Ok(Action::Moved { .. })) {
                            continue;
                        }
                        match result {
                            Ok(action) => yield Ok(MigrationEvent::Migrated { asset: member, action }),
                            Err(e) if e.is_fatal() => {
                                yield Err(e);
                                return;
                            },
                            Err(e) => yield Err(e),
                        }
                    }
                }
            }

            yield Ok(MigrationEvent::Complete);
        })
    }

    /// Migrates the whole catalog, logging per-asset failures, and returns a
    /// tally of what happened.
    ///
    /// Returns `Err` only for fatal errors (template or catalog discovery
    /// failures); the assets handled before one still keep their moves.
    #[instrument(skip_all)]
    pub async fn handle_migration(&self) -> Result<MigrationReport> {
        tracing::info!(backend = self.storage.name(), "Starting storage template migration");
        let mut report = MigrationReport::default();
        let mut events = std::pin::pin!(self.migrate());
        while let Some(event) = events.next().await {
            match event {
                Ok(MigrationEvent::Migrated { action, .. }) => report.record(&action),
                Ok(MigrationEvent::PageLoaded(count)) => tracing::debug!(count, "Migrating page of assets"),
                Ok(MigrationEvent::Started | MigrationEvent::Complete) => {},
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = ?e, "Storage template migration aborted");
                    return Err(e);
                },
                Err(e) => {
                    tracing::warn!(error = ?e, "Asset migration failed");
                    report.failed += 1;
                },
            }
        }
        tracing::info!(
            moved = report.moved,
            unchanged = report.unchanged,
            skipped_read_only = report.skipped_read_only,
            skipped_duplicate = report.skipped_duplicate,
            failed = report.failed,
            "Finished storage template migration"
        );
        Ok(report)
    }
}
