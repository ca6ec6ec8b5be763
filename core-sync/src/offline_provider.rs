//! Metadata served from persisted snapshots.
//!
//! Used in place of the online provider while offline. Episode images point
//! at the locally stored copies; episodes without a stored image have none.

use crate::mirror::format_asset_url;
use async_trait::async_trait;
use core_library::models::AnimeMetadata;
use core_library::repositories::SnapshotRepository;
use core_metadata::{MetadataError, MetadataProvider};
use std::sync::Arc;

pub struct SnapshotMetadataProvider {
    snapshots: Arc<dyn SnapshotRepository>,
    asset_url_prefix: String,
}

impl SnapshotMetadataProvider {
    pub fn new(snapshots: Arc<dyn SnapshotRepository>, asset_url_prefix: impl Into<String>) -> Self {
        Self {
            snapshots,
            asset_url_prefix: asset_url_prefix.into(),
        }
    }
}

#[async_trait]
impl MetadataProvider for SnapshotMetadataProvider {
    async fn get_anime_metadata(&self, media_id: i32) -> core_metadata::Result<AnimeMetadata> {
        let snapshot = self
            .snapshots
            .find(media_id)
            .await?
            .ok_or(MetadataError::NotFound { media_id })?;

        let mut metadata = snapshot.metadata;
        for (key, episode) in metadata.episodes.iter_mut() {
            episode.image = snapshot
                .episode_image_paths
                .get(key)
                .map(|path| format_asset_url(&self.asset_url_prefix, media_id, path));
        }

        Ok(metadata)
    }
}
