//! Storage boundary for the media library.
//!
//! Everything the migration engine needs from a filesystem goes through the
//! [`StorageBackend`] trait: existence checks and non-overwriting moves, plus
//! a handful of support operations used for seeding and rollback. Paths are
//! always relative to the library root and validated with [`validate_path`].

pub mod backend;
pub mod error;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::path::split_extension;
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
