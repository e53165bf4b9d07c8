//! Storage template engine for the stowage media library.
//!
//! Renders the canonical path of every asset from a configurable template
//! ([`PathGenerator`]), decides per asset whether its file needs to move
//! ([`plan`]), finds collision-free destinations ([`resolve`]) and performs
//! the moves while keeping the catalog and move history consistent
//! ([`Migrator`]).

pub mod error;
mod migrate;
pub mod plan;
pub mod resolve;
mod template;

pub use crate::migrate::{Action, MigrationEvent, MigrationReport, Migrator};
pub use crate::template::{PathGenerator, RenderedPath};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::sync::Arc;
use stowage_config::StorageConfig;
use stowage_storage::BackendHandle;
use stowage_storage::backend::{LocalBackend, ReadOnlyBackend};

/// Opens the configured library root, read-only if so configured.
pub fn open_storage(config: &StorageConfig) -> Result<BackendHandle> {
    let local: BackendHandle =
        Arc::new(LocalBackend::new(&config.name, &config.root).or_raise(|| ErrorKind::Configuration)?);
    if config.read_only {
        return Ok(Arc::new(ReadOnlyBackend::new(local)));
    }
    Ok(local)
}
