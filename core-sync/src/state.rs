//! In-memory view shared by the manager and the sync worker.
//!
//! Holds the latest remote collection, the latest local file inventory and
//! the cached mirror collection. Collections are handed out as `Arc`s so the
//! mirror rebuild reads them without copying.

use core_library::models::{AnimeCollection, LocalFile};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct SyncState {
    remote: RwLock<Option<Arc<AnimeCollection>>>,
    local_files: RwLock<Arc<Vec<LocalFile>>>,
    mirror: RwLock<Option<Arc<AnimeCollection>>>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn remote_collection(&self) -> Option<Arc<AnimeCollection>> {
        self.remote.read().await.clone()
    }

    pub async fn set_remote_collection(&self, collection: Arc<AnimeCollection>) {
        *self.remote.write().await = Some(collection);
    }

    pub async fn local_files(&self) -> Arc<Vec<LocalFile>> {
        self.local_files.read().await.clone()
    }

    pub async fn set_local_files(&self, files: Vec<LocalFile>) {
        *self.local_files.write().await = Arc::new(files);
    }

    /// Local files of one media id from the current inventory.
    pub async fn local_files_for(&self, media_id: i32) -> Vec<LocalFile> {
        self.local_files
            .read()
            .await
            .iter()
            .filter(|file| file.media_id == media_id)
            .cloned()
            .collect()
    }

    pub async fn mirror(&self) -> Option<Arc<AnimeCollection>> {
        self.mirror.read().await.clone()
    }

    pub async fn set_mirror(&self, mirror: Option<AnimeCollection>) {
        *self.mirror.write().await = mirror.map(Arc::new);
    }
}
