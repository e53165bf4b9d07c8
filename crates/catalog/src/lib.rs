//! Catalog of media assets, their owners, and the history of file moves.
//!
//! The catalog is the metadata side of the library: it records where each
//! asset's original file is supposed to live. The migration engine reads and
//! writes it exclusively through the repository traits in [`repo`], so any
//! store can sit behind it:
//!
//! - [`SqliteCatalog`]: the persistent store, on top of [`Database`].
//! - `MemoryCatalog` (feature `mock`): an in-memory store for tests which also
//!   records what was asked of it.

mod db;
pub mod error;
#[cfg(any(test, feature = "mock"))]
mod memory;
pub mod models;
mod pagination;
pub mod repo;
mod rows;
mod sqlite;

pub use crate::db::Database;
#[cfg(any(test, feature = "mock"))]
pub use crate::memory::MemoryCatalog;
pub use crate::pagination::{paginate, paginate_from};
pub use crate::repo::{AssetRepository, AssetStore, MoveRepository, MoveStore, UserRepository, UserStore};
pub use crate::sqlite::SqliteCatalog;
