//! # Snapshot Materializer
//!
//! Turns one [`AnimeDiffResult`] into a persisted snapshot.
//!
//! ## Steps
//!
//! 1. Re-read the media's local files from the current inventory. None left
//!    means the media is removed (tracking record, snapshot, assets).
//! 2. Fetch episode metadata, falling back to metadata synthesized from the
//!    local files when the provider fails.
//! 3. `Missing`: download banner, cover and the images of local episodes,
//!    then write a fresh snapshot.
//!    `Metadata`: keep the existing snapshot, download only the episode
//!    images it lacks for episodes present on disk, merge them in and
//!    refresh the metadata and reference key. A `Metadata` diff without a
//!    snapshot is skipped.
//! 4. Re-check tracking before writing. A media untracked while its item was
//!    in flight is removed instead of persisted.
//!
//! A download failure leaves the stores untouched. Download and persistence
//! failures are recorded in the [`FailedItemRegistry`] and reported as
//! `SyncEvent::ItemFailed`; they never stop the worker.

use crate::diff::{AnimeDiffResult, DiffType};
use crate::error::Result;
use crate::failed::FailedItemRegistry;
use crate::reference_key::compute_reference_key;
use crate::state::SyncState;
use bridge_traits::time::Clock;
use core_library::models::{
    AnimeListEntry, AnimeMetadata, AnimeSnapshot, LocalFile, MediaKind,
};
use core_library::repositories::{SnapshotRepository, TrackedMediaRepository};
use core_metadata::downloader::local_episode_image_urls;
use core_metadata::{synthesize_metadata, AssetDownloader, AssetStore, MetadataProvider};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// What happened to one queued item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    Persisted,
    /// The media had no local files left, or was untracked while in flight,
    /// and was removed.
    Removed,
    /// Nothing to refresh.
    Skipped,
    Failed(String),
}

pub struct SnapshotMaterializer {
    tracked: Arc<dyn TrackedMediaRepository>,
    snapshots: Arc<dyn SnapshotRepository>,
    metadata_provider: Arc<dyn MetadataProvider>,
    downloader: Arc<dyn AssetDownloader>,
    assets: Arc<AssetStore>,
    failed: Arc<FailedItemRegistry>,
    state: Arc<SyncState>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
}

impl SnapshotMaterializer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tracked: Arc<dyn TrackedMediaRepository>,
        snapshots: Arc<dyn SnapshotRepository>,
        metadata_provider: Arc<dyn MetadataProvider>,
        downloader: Arc<dyn AssetDownloader>,
        assets: Arc<AssetStore>,
        failed: Arc<FailedItemRegistry>,
        state: Arc<SyncState>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            tracked,
            snapshots,
            metadata_provider,
            downloader,
            assets,
            failed,
            state,
            clock,
            event_bus,
        }
    }

    #[instrument(skip(self, diff), fields(media_id = diff.media_id(), diff_type = %diff.diff_type))]
    pub async fn materialize(&self, diff: &AnimeDiffResult) -> MaterializeOutcome {
        let media_id = diff.media_id();
        let local_files = self.state.local_files_for(media_id).await;

        if local_files.is_empty() {
            info!("No local files left, removing media");
            return match self.remove_media(media_id).await {
                Ok(()) => MaterializeOutcome::Removed,
                Err(e) => {
                    error!(error = %e, "Failed to remove media");
                    self.record_failure(&diff.entry, e.to_string()).await;
                    MaterializeOutcome::Failed(e.to_string())
                }
            };
        }

        let existing = match (diff.diff_type, &diff.snapshot) {
            (DiffType::Missing, _) => None,
            (DiffType::Metadata, Some(existing)) => Some(existing),
            (DiffType::Metadata, None) => {
                debug!("Metadata diff without a snapshot, skipping");
                return MaterializeOutcome::Skipped;
            }
        };

        let metadata = self.fetch_metadata(&diff.entry, &local_files).await;
        let reference_key = compute_reference_key(&diff.entry, &local_files);

        let built = match existing {
            Some(existing) => {
                self.refresh_snapshot(existing, metadata, &local_files, reference_key)
                    .await
            }
            None => {
                self.create_snapshot(&diff.entry, metadata, &local_files, reference_key)
                    .await
            }
        };

        let snapshot = match built {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Image download failed, keeping previous state");
                self.record_failure(&diff.entry, e.to_string()).await;
                return MaterializeOutcome::Failed(e.to_string());
            }
        };

        match self.tracked.find(media_id, MediaKind::Anime).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                info!("Media untracked while processing, discarding downloads");
                if let Err(e) = self.remove_media(media_id).await {
                    warn!(error = %e, "Failed to discard assets of untracked media");
                }
                return MaterializeOutcome::Removed;
            }
            Err(e) => {
                error!(error = %e, "Failed to check tracking");
                self.record_failure(&diff.entry, e.to_string()).await;
                return MaterializeOutcome::Failed(e.to_string());
            }
        }

        if let Err(e) = self.snapshots.save(&snapshot).await {
            error!(error = %e, "Failed to persist snapshot");
            self.record_failure(&diff.entry, e.to_string()).await;
            return MaterializeOutcome::Failed(e.to_string());
        }

        self.failed.clear(media_id).await;
        debug!(
            episode_images = snapshot.episode_image_paths.len(),
            "Snapshot persisted"
        );
        MaterializeOutcome::Persisted
    }

    /// Delete the tracking record, the snapshot and the asset subtree of a media.
    pub async fn remove_media(&self, media_id: i32) -> Result<()> {
        self.tracked.delete(media_id, MediaKind::Anime).await?;
        self.snapshots.delete(media_id).await?;
        self.assets.remove_media(media_id).await?;
        self.failed.clear(media_id).await;
        Ok(())
    }

    /// Record a failure and notify subscribers.
    pub async fn record_failure(&self, entry: &AnimeListEntry, reason: String) {
        let media_id = entry.media_id();
        self.failed
            .record(entry, reason.clone(), self.clock.unix_timestamp())
            .await;
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::ItemFailed {
                media_id,
                message: reason,
            }))
            .ok();
    }

    async fn fetch_metadata(&self, entry: &AnimeListEntry, local_files: &[LocalFile]) -> AnimeMetadata {
        match self.metadata_provider.get_anime_metadata(entry.media_id()).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(error = %e, "Metadata lookup failed, synthesizing from local files");
                synthesize_metadata(&entry.media, local_files)
            }
        }
    }

    async fn create_snapshot(
        &self,
        entry: &AnimeListEntry,
        metadata: AnimeMetadata,
        local_files: &[LocalFile],
        reference_key: String,
    ) -> Result<AnimeSnapshot> {
        let images = self
            .downloader
            .download_collection_images(entry, &metadata, local_files)
            .await?;

        Ok(AnimeSnapshot {
            media_id: entry.media_id(),
            metadata,
            banner_image_path: images.banner,
            cover_image_path: images.cover,
            episode_image_paths: images.episodes,
            reference_key,
        })
    }

    async fn refresh_snapshot(
        &self,
        existing: &AnimeSnapshot,
        metadata: AnimeMetadata,
        local_files: &[LocalFile],
        reference_key: String,
    ) -> Result<AnimeSnapshot> {
        let media_id = existing.media_id;

        let missing: BTreeMap<String, String> =
            local_episode_image_urls(media_id, &metadata, local_files)
                .into_iter()
                .filter(|(key, _)| !existing.episode_image_paths.contains_key(key))
                .collect();

        let mut snapshot = existing.clone();
        if !missing.is_empty() {
            debug!(media_id, count = missing.len(), "Downloading new episode images");
            let downloaded = self
                .downloader
                .download_episode_images(media_id, &missing)
                .await?;
            snapshot.episode_image_paths.extend(downloaded);
        }

        snapshot.metadata = metadata;
        snapshot.reference_key = reference_key;
        Ok(snapshot)
    }
}
