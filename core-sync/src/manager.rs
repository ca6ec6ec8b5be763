//! # Local Manager
//!
//! Public entry point of the offline mirror.
//!
//! ## Overview
//!
//! - Track and untrack media for offline use
//! - Synchronize: refresh inputs, prune stale tracking, enqueue diffs
//! - Auto-track media the user is currently watching
//! - Inspect tracked items, the mirror collection and storage usage
//!
//! ## Usage
//!
//! ```rust,ignore
//! let manager = LocalManager::new(SyncConfig::from(&core_config), dependencies).await?;
//!
//! manager.track_anime(42).await?;
//! manager.synchronize_local().await?;
//! manager.syncer().wait_for_completion().await;
//!
//! let mirror = manager.local_anime_collection().await;
//! ```

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::failed::FailedItemRegistry;
use crate::materializer::SnapshotMaterializer;
use crate::offline_provider::SnapshotMetadataProvider;
use crate::sources::{LocalFileSource, RemoteCollectionSource};
use crate::state::SyncState;
use crate::syncer::{SyncStores, Syncer};
use bridge_traits::time::Clock;
use core_library::models::{
    AnimeCollection, AnimeListEntry, MediaKind, MediaListStatus, TrackedMedia,
};
use core_library::repositories::{
    MirrorCollectionRepository, SnapshotRepository, TrackedMediaRepository,
};
use core_library::LibraryError;
use core_metadata::{AssetDownloader, AssetStore, MetadataProvider};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Collaborators the manager is built from.
#[derive(Clone)]
pub struct ManagerDependencies {
    pub tracked: Arc<dyn TrackedMediaRepository>,
    pub snapshots: Arc<dyn SnapshotRepository>,
    pub mirror: Arc<dyn MirrorCollectionRepository>,
    pub metadata_provider: Arc<dyn MetadataProvider>,
    pub downloader: Arc<dyn AssetDownloader>,
    pub assets: Arc<AssetStore>,
    pub remote: Arc<dyn RemoteCollectionSource>,
    pub local_files: Arc<dyn LocalFileSource>,
    pub event_bus: EventBus,
    pub clock: Arc<dyn Clock>,
}

/// A tracked media with the list entry describing it, if one is known.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedMediaItem {
    pub tracked: TrackedMedia,
    pub entry: Option<AnimeListEntry>,
}

pub struct LocalManager {
    config: SyncConfig,
    tracked: Arc<dyn TrackedMediaRepository>,
    snapshots: Arc<dyn SnapshotRepository>,
    assets: Arc<AssetStore>,
    remote: Arc<dyn RemoteCollectionSource>,
    local_files: Arc<dyn LocalFileSource>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    state: Arc<SyncState>,
    materializer: Arc<SnapshotMaterializer>,
    syncer: Syncer,
}

impl LocalManager {
    /// Build the manager and start the sync worker.
    ///
    /// The last persisted mirror collection is loaded so it is available
    /// before the first synchronization.
    pub async fn new(config: SyncConfig, deps: ManagerDependencies) -> Result<Self> {
        let state = Arc::new(SyncState::new());
        state.set_mirror(deps.mirror.load().await?).await;

        let failed = Arc::new(FailedItemRegistry::new());

        let materializer = Arc::new(SnapshotMaterializer::new(
            deps.tracked.clone(),
            deps.snapshots.clone(),
            deps.metadata_provider.clone(),
            deps.downloader.clone(),
            deps.assets.clone(),
            failed.clone(),
            state.clone(),
            deps.clock.clone(),
            deps.event_bus.clone(),
        ));

        let syncer = Syncer::new(
            config.clone(),
            materializer.clone(),
            SyncStores {
                tracked: deps.tracked.clone(),
                snapshots: deps.snapshots.clone(),
                mirror: deps.mirror.clone(),
            },
            state.clone(),
            failed,
            deps.event_bus.clone(),
        );

        info!(
            queue_capacity = config.queue_capacity,
            asset_dir = %deps.assets.root().display(),
            "Local manager ready"
        );

        Ok(Self {
            config,
            tracked: deps.tracked,
            snapshots: deps.snapshots,
            assets: deps.assets,
            remote: deps.remote,
            local_files: deps.local_files,
            event_bus: deps.event_bus,
            clock: deps.clock,
            state,
            materializer,
            syncer,
        })
    }

    pub fn syncer(&self) -> &Syncer {
        &self.syncer
    }

    /// Pull fresh inputs, prune stale tracking and enqueue the resulting diffs.
    ///
    /// Tracked media that left the remote collection or have no local files
    /// are removed together with their snapshot and assets.
    ///
    /// # Returns
    /// The number of enqueued items. `0` also when the queue was still busy.
    ///
    /// # Errors
    /// `CollectionUnavailable` when the remote collection was never fetched.
    #[instrument(skip(self))]
    pub async fn synchronize_local(&self) -> Result<usize> {
        let remote = self.refresh_remote_collection().await?;
        let local_files = self.local_files.local_files().await?;
        let media_with_files: BTreeSet<i32> = local_files.iter().map(|f| f.media_id).collect();
        self.state.set_local_files(local_files).await;

        let mut pruned = 0;
        for tracked in self.tracked.find_all(MediaKind::Anime).await? {
            let media_id = tracked.media_id;
            let in_collection = remote.contains_media(media_id);
            if in_collection && media_with_files.contains(&media_id) {
                continue;
            }

            info!(media_id, in_collection, "Pruning tracked media");
            match self.materializer.remove_media(media_id).await {
                Ok(()) => {
                    pruned += 1;
                    self.event_bus
                        .emit(CoreEvent::Library(LibraryEvent::MediaUntracked { media_id }))
                        .ok();
                }
                Err(e) => warn!(media_id, error = %e, "Failed to prune tracked media"),
            }
        }

        let enqueued = self.syncer.run_diffs().await?;
        if enqueued == 0 && pruned > 0 {
            self.syncer.refresh_collections().await;
        }

        debug!(pruned, enqueued, "Local synchronization requested");
        Ok(enqueued)
    }

    /// Opt a media into offline mirroring.
    ///
    /// # Errors
    /// - `CollectionUnavailable` when there is no remote collection
    /// - `NotInCollection` when the media is not in the user's lists
    /// - `AlreadyTracked` when the media is tracked already
    #[instrument(skip(self))]
    pub async fn track_anime(&self, media_id: i32) -> Result<()> {
        let remote = self.current_collection().await?;
        if !remote.contains_media(media_id) {
            return Err(SyncError::NotInCollection { media_id });
        }

        if self.tracked.find(media_id, MediaKind::Anime).await?.is_some() {
            return Err(SyncError::AlreadyTracked { media_id });
        }

        self.tracked
            .insert(&TrackedMedia::anime(media_id, self.clock.unix_timestamp()))
            .await
            .map_err(|e| match e {
                LibraryError::AlreadyExists { .. } => SyncError::AlreadyTracked { media_id },
                other => SyncError::Library(other),
            })?;

        info!("Media tracked");
        self.event_bus
            .emit(CoreEvent::Library(LibraryEvent::MediaTracked { media_id }))
            .ok();
        Ok(())
    }

    /// Stop mirroring a media. Its tracking record, snapshot and assets are
    /// gone when this returns; the mirror collection follows.
    ///
    /// # Errors
    /// `NotTracked` when the media is not tracked.
    #[instrument(skip(self))]
    pub async fn untrack_anime(&self, media_id: i32) -> Result<()> {
        if self.tracked.find(media_id, MediaKind::Anime).await?.is_none() {
            return Err(SyncError::NotTracked { media_id });
        }

        self.materializer.remove_media(media_id).await?;

        info!("Media untracked");
        self.event_bus
            .emit(CoreEvent::Library(LibraryEvent::MediaUntracked { media_id }))
            .ok();

        self.syncer.refresh_collections().await;
        Ok(())
    }

    /// Track every currently watched media that has local files.
    ///
    /// # Returns
    /// `true` if anything was added.
    #[instrument(skip(self))]
    pub async fn auto_track_current_media(&self) -> Result<bool> {
        let remote = self.current_collection().await?;

        let mut local_files = self.state.local_files().await;
        if local_files.is_empty() {
            self.state
                .set_local_files(self.local_files.local_files().await?)
                .await;
            local_files = self.state.local_files().await;
        }
        let media_with_files: BTreeSet<i32> = local_files.iter().map(|f| f.media_id).collect();

        let already_tracked: BTreeSet<i32> = self
            .tracked
            .find_all(MediaKind::Anime)
            .await?
            .into_iter()
            .map(|t| t.media_id)
            .collect();

        let candidates: BTreeSet<i32> = remote
            .entries()
            .filter(|entry| entry.status == Some(MediaListStatus::Current))
            .map(AnimeListEntry::media_id)
            .filter(|id| media_with_files.contains(id) && !already_tracked.contains(id))
            .collect();

        let now = self.clock.unix_timestamp();
        let mut added = 0;
        for media_id in candidates {
            match self.tracked.insert(&TrackedMedia::anime(media_id, now)).await {
                Ok(()) => {
                    added += 1;
                    self.event_bus
                        .emit(CoreEvent::Library(LibraryEvent::MediaTracked { media_id }))
                        .ok();
                }
                Err(LibraryError::AlreadyExists { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!(added, "Auto-tracked current media");
        Ok(added > 0)
    }

    /// Tracked media with their entries, preferring the mirror entry over the
    /// remote one.
    pub async fn tracked_media_items(&self) -> Result<Vec<TrackedMediaItem>> {
        let mirror = self.state.mirror().await;
        let remote = self.state.remote_collection().await;

        let items = self
            .tracked
            .find_all(MediaKind::Anime)
            .await?
            .into_iter()
            .map(|tracked| {
                let entry = mirror
                    .as_ref()
                    .and_then(|m| m.find_entry(tracked.media_id))
                    .or_else(|| remote.as_ref().and_then(|r| r.find_entry(tracked.media_id)))
                    .cloned();
                TrackedMediaItem { tracked, entry }
            })
            .collect();

        Ok(items)
    }

    pub async fn is_media_tracked(&self, media_id: i32) -> Result<bool> {
        Ok(self.tracked.find(media_id, MediaKind::Anime).await?.is_some())
    }

    /// Size in bytes of the asset directory, cached between mutations.
    pub async fn local_storage_size(&self) -> Result<u64> {
        Ok(self.assets.size().await?)
    }

    /// The last rebuilt mirror collection.
    pub async fn local_anime_collection(&self) -> Option<Arc<AnimeCollection>> {
        self.state.mirror().await
    }

    /// Metadata provider backed by the persisted snapshots.
    pub fn offline_metadata_provider(&self) -> SnapshotMetadataProvider {
        SnapshotMetadataProvider::new(self.snapshots.clone(), self.config.asset_url_prefix.clone())
    }

    async fn refresh_remote_collection(&self) -> Result<Arc<AnimeCollection>> {
        let collection = self
            .remote
            .anime_collection()
            .await?
            .ok_or(SyncError::CollectionUnavailable)?;

        let collection = Arc::new(collection);
        self.state.set_remote_collection(collection.clone()).await;
        Ok(collection)
    }

    async fn current_collection(&self) -> Result<Arc<AnimeCollection>> {
        match self.state.remote_collection().await {
            Some(collection) => Ok(collection),
            None => self.refresh_remote_collection().await,
        }
    }
}
