//! Inputs supplied by the host: the remote collection and the local file
//! inventory.

use crate::error::Result;
use async_trait::async_trait;
use core_library::models::{AnimeCollection, LocalFile};

#[async_trait]
pub trait RemoteCollectionSource: Send + Sync {
    /// The user's anime collection, `None` when it has never been fetched.
    async fn anime_collection(&self) -> Result<Option<AnimeCollection>>;
}

#[async_trait]
pub trait LocalFileSource: Send + Sync {
    /// Every video file matched to a media id.
    async fn local_files(&self) -> Result<Vec<LocalFile>>;
}
