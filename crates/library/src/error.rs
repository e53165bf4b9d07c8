//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Errors fall into two groups. [`Configuration`](ErrorKind::Configuration)
//! and [`Discovery`](ErrorKind::Discovery) abort a whole migration run; every
//! other kind names the asset it happened to and only fails that asset.

use derive_more::{Display, Error};
use stowage_catalog::models::AssetId;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The storage template (or the storage it points at) can't be used.
    #[display("invalid storage template configuration")]
    Configuration,
    /// The owner list or a page of assets could not be loaded.
    #[display("could not load assets from the catalog")]
    Discovery,
    /// The template rendered an empty or out-of-bounds path for this asset.
    #[display("storage template rendered an invalid path for asset {_0}")]
    InvalidRenderedPath(#[error(not(source))] AssetId),
    #[display("could not resolve the owner of asset {_0}")]
    UserResolution(#[error(not(source))] AssetId),
    /// The file could not be moved; the catalog still has the old path.
    #[display("could not move the file of asset {_0}")]
    StorageMove(#[error(not(source))] AssetId),
    #[display("no free path left for asset {_0}")]
    DuplicatePathExhaustion(#[error(not(source))] AssetId),
    #[display("catalog update failed for asset {_0}")]
    Catalog(#[error(not(source))] AssetId),
}

impl ErrorKind {
    /// Returns `true` if the error must abort the whole run rather than a
    /// single asset.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration | Self::Discovery)
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Discovery | Self::StorageMove(_) | Self::Catalog(_))
    }
}
