//! # Local Asset Store
//!
//! Downloaded images live under `{root}/{media_id}/`. Paths handed out to
//! snapshots are relative to the media directory, e.g. `cover.jpg` or
//! `episodes/3.png`.
//!
//! The total size of the tree is cached after the first measurement. Every
//! write or removal made through the store clears the cached value.

use crate::error::Result;
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use core_runtime::logging::strip_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct AssetStore {
    root: PathBuf,
    file_system: Arc<dyn FileSystemAccess>,
    cached_size: Mutex<Option<u64>>,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>, file_system: Arc<dyn FileSystemAccess>) -> Self {
        Self {
            root: root.into(),
            file_system,
            cached_size: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn media_dir(&self, media_id: i32) -> PathBuf {
        self.root.join(media_id.to_string())
    }

    /// Write an asset for a media id, replacing any previous file.
    pub async fn write(&self, media_id: i32, relative_path: &str, data: Bytes) -> Result<()> {
        let path = self.media_dir(media_id).join(relative_path);
        let size = data.len();

        self.file_system.write_file(&path, data).await?;
        self.invalidate_size().await;

        debug!(
            media_id,
            file = %strip_path(&path.to_string_lossy()),
            size,
            "Stored asset"
        );
        Ok(())
    }

    /// Delete the whole asset subtree of a media id.
    pub async fn remove_media(&self, media_id: i32) -> Result<()> {
        self.file_system
            .delete_dir_all(&self.media_dir(media_id))
            .await?;
        self.invalidate_size().await;

        info!(media_id, "Removed media assets");
        Ok(())
    }

    pub async fn media_exists(&self, media_id: i32) -> Result<bool> {
        Ok(self.file_system.exists(&self.media_dir(media_id)).await?)
    }

    /// Total size in bytes of every stored asset.
    pub async fn size(&self) -> Result<u64> {
        let mut cached = self.cached_size.lock().await;
        if let Some(size) = *cached {
            return Ok(size);
        }

        let size = if self.file_system.exists(&self.root).await? {
            self.file_system.directory_size(&self.root).await?
        } else {
            0
        };

        *cached = Some(size);
        Ok(size)
    }

    pub async fn invalidate_size(&self) {
        *self.cached_size.lock().await = None;
    }
}
