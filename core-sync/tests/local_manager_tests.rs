//! Integration tests for the local manager
//!
//! These tests drive the whole engine against an in-memory database and a
//! scratch asset directory:
//! - Tracking, materialization and the mirror rebuild
//! - Pruning and untracking
//! - Delta image downloads when new episodes appear
//! - Queue state events, busy queue handling and failure isolation
//! - Untracking or pruning while an item is still in flight

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::time::Clock;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use core_library::db::create_test_pool;
use core_library::models::{
    AnimeCollection, AnimeList, AnimeListEntry, AnimeMetadata, AnimeSnapshot, BaseAnime,
    CoverImage, EpisodeMetadata, LocalFile, LocalFileMetadata, LocalFileType, MediaListStatus,
    MediaTitle,
};
use core_library::repositories::{
    SnapshotRepository, SqliteMirrorCollectionRepository, SqliteSnapshotRepository,
    SqliteTrackedMediaRepository,
};
use core_library::LibraryError;
use core_metadata::{AssetStore, HttpAssetDownloader, MetadataError, MetadataProvider};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, SyncEvent};
use core_sync::{
    LocalFileSource, LocalManager, ManagerDependencies, RemoteCollectionSource, SyncConfig,
    SyncError,
};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakeRemote {
    collection: Mutex<Option<AnimeCollection>>,
}

impl FakeRemote {
    async fn set(&self, collection: Option<AnimeCollection>) {
        *self.collection.lock().await = collection;
    }
}

#[async_trait]
impl RemoteCollectionSource for FakeRemote {
    async fn anime_collection(&self) -> core_sync::Result<Option<AnimeCollection>> {
        Ok(self.collection.lock().await.clone())
    }
}

#[derive(Default)]
struct FakeLocalFiles {
    files: Mutex<Vec<LocalFile>>,
}

impl FakeLocalFiles {
    async fn set(&self, files: Vec<LocalFile>) {
        *self.files.lock().await = files;
    }
}

#[async_trait]
impl LocalFileSource for FakeLocalFiles {
    async fn local_files(&self) -> core_sync::Result<Vec<LocalFile>> {
        Ok(self.files.lock().await.clone())
    }
}

/// Serves registered metadata; unknown media fail so the engine falls back
/// to synthesized metadata.
#[derive(Default)]
struct FakeMetadataProvider {
    metadata: Mutex<HashMap<i32, AnimeMetadata>>,
    panic_on: Mutex<HashSet<i32>>,
}

impl FakeMetadataProvider {
    async fn set(&self, media_id: i32, metadata: AnimeMetadata) {
        self.metadata.lock().await.insert(media_id, metadata);
    }

    async fn panic_on(&self, media_id: i32) {
        self.panic_on.lock().await.insert(media_id);
    }
}

#[async_trait]
impl MetadataProvider for FakeMetadataProvider {
    async fn get_anime_metadata(&self, media_id: i32) -> core_metadata::Result<AnimeMetadata> {
        if self.panic_on.lock().await.contains(&media_id) {
            panic!("metadata provider exploded for {}", media_id);
        }
        self.metadata
            .lock()
            .await
            .get(&media_id)
            .cloned()
            .ok_or(MetadataError::NotFound { media_id })
    }
}

/// Answers every request with a small body. Requests can be held back by a
/// gate and single URLs can be made to fail.
#[derive(Default)]
struct FakeHttp {
    requests: StdMutex<Vec<String>>,
    not_found: StdMutex<HashSet<String>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeHttp {
    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    fn fail(&self, url: &str) {
        self.not_found.lock().unwrap().insert(url.to_string());
    }

    fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        self.requests.lock().unwrap().push(request.url.clone());
        let status = if self.not_found.lock().unwrap().contains(&request.url) {
            404
        } else {
            200
        };

        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(format!("image:{}", request.url)),
        })
    }
}

/// SQLite snapshots whose writes fail for one media id.
struct FailingSaveSnapshots {
    inner: Arc<SqliteSnapshotRepository>,
    fail_for: i32,
}

#[async_trait]
impl SnapshotRepository for FailingSaveSnapshots {
    async fn find(&self, media_id: i32) -> core_library::Result<Option<AnimeSnapshot>> {
        self.inner.find(media_id).await
    }

    async fn find_all(&self) -> core_library::Result<Vec<AnimeSnapshot>> {
        self.inner.find_all().await
    }

    async fn save(&self, snapshot: &AnimeSnapshot) -> core_library::Result<()> {
        if snapshot.media_id == self.fail_for {
            return Err(LibraryError::InvalidInput {
                field: "snapshot".to_string(),
                message: "disk full".to_string(),
            });
        }
        self.inner.save(snapshot).await
    }

    async fn delete(&self, media_id: i32) -> core_library::Result<bool> {
        self.inner.delete(media_id).await
    }
}

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn entry(media_id: i32, status: MediaListStatus, episodes: i32) -> AnimeListEntry {
    AnimeListEntry {
        id: media_id * 10,
        progress: Some(1),
        status: Some(status),
        media: BaseAnime {
            id: media_id,
            title: Some(MediaTitle {
                romaji: Some(format!("Show {}", media_id)),
                ..Default::default()
            }),
            episodes: Some(episodes),
            banner_image: Some(format!("https://img.example/{}/banner.jpg", media_id)),
            cover_image: Some(CoverImage {
                extra_large: Some(format!("https://img.example/{}/cover.png", media_id)),
                color: Some("#aabbcc".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn collection(entries: Vec<AnimeListEntry>) -> AnimeCollection {
    AnimeCollection {
        lists: vec![AnimeList {
            status: Some(MediaListStatus::Current),
            name: Some("Watching".to_string()),
            is_custom_list: Some(false),
            entries,
        }],
    }
}

fn episode_url(media_id: i32, episode: i32) -> String {
    format!("https://img.example/{}/ep{}.jpg", media_id, episode)
}

fn metadata(media_id: i32, episodes: impl IntoIterator<Item = i32>) -> AnimeMetadata {
    let episodes: Vec<i32> = episodes.into_iter().collect();
    AnimeMetadata {
        episode_count: episodes.len() as i32,
        episodes: episodes
            .iter()
            .map(|ep| {
                (
                    ep.to_string(),
                    EpisodeMetadata {
                        episode: ep.to_string(),
                        episode_number: *ep,
                        title: Some(format!("Episode {}", ep)),
                        image: Some(episode_url(media_id, *ep)),
                        ..Default::default()
                    },
                )
            })
            .collect(),
        ..Default::default()
    }
}

fn files(media_id: i32, episodes: impl IntoIterator<Item = i32>) -> Vec<LocalFile> {
    episodes
        .into_iter()
        .map(|ep| LocalFile {
            path: format!("/videos/{}/{:02}.mkv", media_id, ep),
            media_id,
            metadata: LocalFileMetadata {
                episode: ep,
                anidb_episode: ep.to_string(),
                kind: LocalFileType::Main,
            },
        })
        .collect()
}

struct Harness {
    manager: LocalManager,
    remote: Arc<FakeRemote>,
    local_files: Arc<FakeLocalFiles>,
    metadata: Arc<FakeMetadataProvider>,
    http: Arc<FakeHttp>,
    snapshots: Arc<SqliteSnapshotRepository>,
    event_bus: EventBus,
    root: PathBuf,
}

impl Harness {
    async fn new(name: &str) -> Self {
        Self::build(name, create_test_pool().await.unwrap(), FakeHttp::default()).await
    }

    async fn build(name: &str, pool: SqlitePool, http: FakeHttp) -> Self {
        Self::build_with(name, pool, http, None).await
    }

    /// `fail_save_for` makes every snapshot write of that media fail.
    async fn build_with(
        name: &str,
        pool: SqlitePool,
        http: FakeHttp,
        fail_save_for: Option<i32>,
    ) -> Self {
        let root = std::env::temp_dir().join(format!("core-sync-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&root);

        let snapshots = Arc::new(SqliteSnapshotRepository::new(pool.clone()));
        let assets = Arc::new(AssetStore::new(root.clone(), Arc::new(TokioFileSystem::new())));
        let http = Arc::new(http);
        let remote = Arc::new(FakeRemote::default());
        let local_files = Arc::new(FakeLocalFiles::default());
        let metadata = Arc::new(FakeMetadataProvider::default());
        let event_bus = EventBus::new(256);

        let store: Arc<dyn SnapshotRepository> = match fail_save_for {
            Some(fail_for) => Arc::new(FailingSaveSnapshots {
                inner: snapshots.clone(),
                fail_for,
            }),
            None => snapshots.clone(),
        };

        let deps = ManagerDependencies {
            tracked: Arc::new(SqliteTrackedMediaRepository::new(pool.clone())),
            snapshots: store,
            mirror: Arc::new(SqliteMirrorCollectionRepository::new(pool)),
            metadata_provider: metadata.clone(),
            downloader: Arc::new(HttpAssetDownloader::new(
                http.clone(),
                assets.clone(),
                Duration::from_secs(5),
            )),
            assets,
            remote: remote.clone(),
            local_files: local_files.clone(),
            event_bus: event_bus.clone(),
            clock: Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap())),
        };

        let manager = LocalManager::new(SyncConfig::default(), deps).await.unwrap();

        Self {
            manager,
            remote,
            local_files,
            metadata,
            http,
            snapshots,
            event_bus,
            root,
        }
    }

    /// Media `media_id` in the remote collection with episodes on disk and
    /// metadata available.
    async fn seed(&self, entries: Vec<AnimeListEntry>, episodes: &[i32]) {
        let mut all_files = Vec::new();
        for entry in &entries {
            let media_id = entry.media_id();
            all_files.extend(files(media_id, episodes.iter().copied()));
            self.metadata
                .set(media_id, metadata(media_id, episodes.iter().copied()))
                .await;
        }
        self.remote.set(Some(collection(entries))).await;
        self.local_files.set(all_files).await;
    }

    async fn drain(&self) {
        tokio::time::timeout(
            Duration::from_secs(10),
            self.manager.syncer().wait_for_completion(),
        )
        .await
        .expect("queue did not drain");
    }

    fn asset(&self, media_id: i32, relative: &str) -> PathBuf {
        self.root.join(media_id.to_string()).join(relative)
    }
}

fn drain_events(receiver: &mut tokio::sync::broadcast::Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_track_and_synchronize_materializes_snapshot() {
    let h = Harness::new("materialize").await;
    h.seed(vec![entry(42, MediaListStatus::Current, 12)], &[1, 2, 3])
        .await;

    h.manager.track_anime(42).await.unwrap();
    assert!(h.manager.is_media_tracked(42).await.unwrap());

    assert_eq!(h.manager.synchronize_local().await.unwrap(), 1);
    h.drain().await;

    let snapshot = h.snapshots.find(42).await.unwrap().expect("snapshot stored");
    assert_eq!(snapshot.banner_image_path.as_deref(), Some("banner.jpg"));
    assert_eq!(snapshot.cover_image_path.as_deref(), Some("cover.png"));
    assert_eq!(snapshot.episode_image_paths.len(), 3);
    assert_eq!(snapshot.episode_image_paths["2"], "episodes/2.jpg");
    assert!(h.asset(42, "banner.jpg").exists());
    assert!(h.asset(42, "episodes/3.jpg").exists());

    let mirror = h.manager.local_anime_collection().await.expect("mirror built");
    let mirrored = mirror.find_entry(42).expect("tracked entry mirrored");
    assert_eq!(
        mirrored.media.banner_image.as_deref(),
        Some("/offline/assets/42/banner.jpg")
    );
    assert_eq!(
        mirrored.media.cover_url(),
        Some("/offline/assets/42/cover.png")
    );

    assert!(h.manager.local_storage_size().await.unwrap() > 0);
    assert!(h.manager.syncer().failed_items().await.is_empty());
}

#[tokio::test]
async fn test_second_pass_is_a_no_op() {
    let h = Harness::new("idempotent").await;
    h.seed(vec![entry(42, MediaListStatus::Current, 12)], &[1, 2])
        .await;
    h.manager.track_anime(42).await.unwrap();

    assert_eq!(h.manager.synchronize_local().await.unwrap(), 1);
    h.drain().await;

    assert_eq!(h.manager.synchronize_local().await.unwrap(), 0);
    assert_eq!(h.http.request_count(&episode_url(42, 1)), 1);
}

#[tokio::test]
async fn test_new_episode_downloads_only_missing_images() {
    let h = Harness::new("delta").await;
    h.seed(vec![entry(42, MediaListStatus::Current, 13)], &[1, 2, 3])
        .await;
    h.manager.track_anime(42).await.unwrap();
    h.manager.synchronize_local().await.unwrap();
    h.drain().await;

    h.seed(vec![entry(42, MediaListStatus::Current, 13)], &[1, 2, 3, 13])
        .await;
    assert_eq!(h.manager.synchronize_local().await.unwrap(), 1);
    h.drain().await;

    let snapshot = h.snapshots.find(42).await.unwrap().unwrap();
    assert_eq!(snapshot.episode_image_paths.len(), 4);
    assert_eq!(snapshot.episode_image_paths["1"], "episodes/1.jpg");
    assert_eq!(snapshot.episode_image_paths["13"], "episodes/13.jpg");
    assert!(snapshot.metadata.episodes.contains_key("13"));

    assert_eq!(h.http.request_count(&episode_url(42, 1)), 1);
    assert_eq!(h.http.request_count(&episode_url(42, 13)), 1);
    assert_eq!(h.http.request_count("https://img.example/42/banner.jpg"), 1);
}

#[tokio::test]
async fn test_progress_change_refreshes_snapshot() {
    let h = Harness::new("progress").await;
    h.seed(vec![entry(42, MediaListStatus::Current, 12)], &[1])
        .await;
    h.manager.track_anime(42).await.unwrap();
    h.manager.synchronize_local().await.unwrap();
    h.drain().await;
    let before = h.snapshots.find(42).await.unwrap().unwrap().reference_key;

    let mut updated = entry(42, MediaListStatus::Current, 12);
    updated.progress = Some(2);
    h.remote.set(Some(collection(vec![updated]))).await;

    assert_eq!(h.manager.synchronize_local().await.unwrap(), 1);
    h.drain().await;

    let after = h.snapshots.find(42).await.unwrap().unwrap().reference_key;
    assert_ne!(before, after);
    assert_eq!(h.manager.synchronize_local().await.unwrap(), 0);
}

#[tokio::test]
async fn test_pruning_removes_media_without_local_files() {
    let h = Harness::new("prune-files").await;
    h.seed(vec![entry(42, MediaListStatus::Current, 12)], &[1, 2])
        .await;
    h.manager.track_anime(42).await.unwrap();
    h.manager.synchronize_local().await.unwrap();
    h.drain().await;
    assert!(h.asset(42, "banner.jpg").exists());

    h.local_files.set(Vec::new()).await;
    let mut events = h.event_bus.subscribe();

    assert_eq!(h.manager.synchronize_local().await.unwrap(), 0);

    assert!(!h.manager.is_media_tracked(42).await.unwrap());
    assert!(h.snapshots.find(42).await.unwrap().is_none());
    assert!(!h.root.join("42").exists());

    let mirror = h.manager.local_anime_collection().await.unwrap();
    assert!(mirror.find_entry(42).is_none());

    let events = drain_events(&mut events);
    assert!(events.contains(&CoreEvent::Library(LibraryEvent::MediaUntracked {
        media_id: 42
    })));
}

#[tokio::test]
async fn test_pruning_removes_media_dropped_from_collection() {
    let h = Harness::new("prune-remote").await;
    h.seed(
        vec![
            entry(1, MediaListStatus::Current, 12),
            entry(2, MediaListStatus::Current, 12),
        ],
        &[1],
    )
    .await;
    h.manager.track_anime(1).await.unwrap();
    h.manager.track_anime(2).await.unwrap();
    assert_eq!(h.manager.synchronize_local().await.unwrap(), 2);
    h.drain().await;

    h.remote
        .set(Some(collection(vec![entry(1, MediaListStatus::Current, 12)])))
        .await;
    assert_eq!(h.manager.synchronize_local().await.unwrap(), 0);

    assert!(h.manager.is_media_tracked(1).await.unwrap());
    assert!(!h.manager.is_media_tracked(2).await.unwrap());
    assert!(h.snapshots.find(2).await.unwrap().is_none());
    assert!(h.root.join("1").exists());
    assert!(!h.root.join("2").exists());
}

#[tokio::test]
async fn test_untrack_is_synchronous() {
    let h = Harness::new("untrack").await;
    h.seed(vec![entry(42, MediaListStatus::Current, 12)], &[1])
        .await;
    h.manager.track_anime(42).await.unwrap();
    h.manager.synchronize_local().await.unwrap();
    h.drain().await;

    h.manager.untrack_anime(42).await.unwrap();

    assert!(!h.manager.is_media_tracked(42).await.unwrap());
    assert!(h.snapshots.find(42).await.unwrap().is_none());
    assert!(!h.root.join("42").exists());
    let mirror = h.manager.local_anime_collection().await.unwrap();
    assert!(mirror.find_entry(42).is_none());

    assert!(matches!(
        h.manager.untrack_anime(42).await,
        Err(SyncError::NotTracked { media_id: 42 })
    ));
}

#[tokio::test]
async fn test_untrack_while_in_flight_discards_downloads() {
    let gate = Arc::new(Semaphore::new(0));
    let h = Harness::build(
        "untrack-in-flight",
        create_test_pool().await.unwrap(),
        FakeHttp::gated(gate.clone()),
    )
    .await;
    h.seed(vec![entry(42, MediaListStatus::Current, 12)], &[1, 2, 3])
        .await;
    h.manager.track_anime(42).await.unwrap();

    assert_eq!(h.manager.synchronize_local().await.unwrap(), 1);
    h.manager.untrack_anime(42).await.unwrap();

    gate.add_permits(Semaphore::MAX_PERMITS / 2);
    h.drain().await;

    assert!(!h.manager.is_media_tracked(42).await.unwrap());
    assert!(h.snapshots.find(42).await.unwrap().is_none());
    assert!(!h.root.join("42").exists());
    assert!(h.manager.syncer().failed_items().await.is_empty());

    assert_eq!(h.manager.synchronize_local().await.unwrap(), 0);
    assert!(h.snapshots.find(42).await.unwrap().is_none());
    assert!(!h.root.join("42").exists());
}

#[tokio::test]
async fn test_prune_while_in_flight_discards_downloads() {
    let gate = Arc::new(Semaphore::new(0));
    let h = Harness::build(
        "prune-in-flight",
        create_test_pool().await.unwrap(),
        FakeHttp::gated(gate.clone()),
    )
    .await;
    h.seed(vec![entry(42, MediaListStatus::Current, 12)], &[1])
        .await;
    h.manager.track_anime(42).await.unwrap();
    assert_eq!(h.manager.synchronize_local().await.unwrap(), 1);

    h.remote.set(Some(collection(Vec::new()))).await;
    assert_eq!(h.manager.synchronize_local().await.unwrap(), 0);
    assert!(!h.manager.is_media_tracked(42).await.unwrap());

    gate.add_permits(Semaphore::MAX_PERMITS / 2);
    h.drain().await;

    assert!(h.snapshots.find(42).await.unwrap().is_none());
    assert!(!h.root.join("42").exists());
}

#[tokio::test]
async fn test_concurrent_synchronize_schedules_one_batch() {
    let gate = Arc::new(Semaphore::new(0));
    let h = Harness::build(
        "concurrent",
        create_test_pool().await.unwrap(),
        FakeHttp::gated(gate.clone()),
    )
    .await;
    h.seed(
        vec![
            entry(1, MediaListStatus::Current, 12),
            entry(2, MediaListStatus::Current, 12),
        ],
        &[1],
    )
    .await;
    h.manager.track_anime(1).await.unwrap();
    h.manager.track_anime(2).await.unwrap();

    let (first, second) = tokio::join!(h.manager.synchronize_local(), h.manager.synchronize_local());
    let mut counts = [first.unwrap(), second.unwrap()];
    counts.sort_unstable();
    assert_eq!(counts, [0, 2]);
    assert_eq!(h.manager.syncer().queue_len().await, 2);

    gate.add_permits(Semaphore::MAX_PERMITS / 2);
    h.drain().await;

    assert_eq!(h.http.request_count("https://img.example/1/banner.jpg"), 1);
    assert_eq!(h.http.request_count("https://img.example/2/banner.jpg"), 1);
}

#[tokio::test]
async fn test_persistence_failure_is_recorded_and_worker_continues() {
    let h = Harness::build_with(
        "save-failure",
        create_test_pool().await.unwrap(),
        FakeHttp::default(),
        Some(1),
    )
    .await;
    h.seed(
        vec![
            entry(1, MediaListStatus::Current, 12),
            entry(2, MediaListStatus::Current, 12),
        ],
        &[1],
    )
    .await;
    h.manager.track_anime(1).await.unwrap();
    h.manager.track_anime(2).await.unwrap();

    let mut events = h.event_bus.subscribe();
    assert_eq!(h.manager.synchronize_local().await.unwrap(), 2);
    h.drain().await;

    let failed = h.manager.syncer().failed_items().await;
    assert_eq!(failed.len(), 1);
    assert!(failed[&1].reason.contains("disk full"));
    assert!(h.manager.is_media_tracked(1).await.unwrap());

    assert!(h.snapshots.find(1).await.unwrap().is_none());
    assert!(h.snapshots.find(2).await.unwrap().is_some());

    let events = drain_events(&mut events);
    assert!(events
        .iter()
        .any(|e| matches!(e, CoreEvent::Sync(SyncEvent::ItemFailed { media_id: 1, .. }))));
    let finished = events
        .iter()
        .filter(|e| **e == CoreEvent::Sync(SyncEvent::Finished))
        .count();
    assert_eq!(finished, 1);
}

#[tokio::test]
async fn test_track_errors() {
    let h = Harness::new("track-errors").await;

    assert!(matches!(
        h.manager.track_anime(42).await,
        Err(SyncError::CollectionUnavailable)
    ));
    assert!(matches!(
        h.manager.synchronize_local().await,
        Err(SyncError::CollectionUnavailable)
    ));

    h.seed(vec![entry(42, MediaListStatus::Current, 12)], &[1])
        .await;
    assert!(matches!(
        h.manager.track_anime(7).await,
        Err(SyncError::NotInCollection { media_id: 7 })
    ));

    h.manager.track_anime(42).await.unwrap();
    assert!(matches!(
        h.manager.track_anime(42).await,
        Err(SyncError::AlreadyTracked { media_id: 42 })
    ));
}

#[tokio::test]
async fn test_queue_state_is_published_in_order() {
    let h = Harness::new("queue-state").await;
    h.seed(
        vec![
            entry(1, MediaListStatus::Current, 12),
            entry(2, MediaListStatus::Current, 12),
        ],
        &[1],
    )
    .await;
    h.manager.track_anime(1).await.unwrap();
    h.manager.track_anime(2).await.unwrap();

    let mut events = h.event_bus.subscribe();
    assert_eq!(h.manager.synchronize_local().await.unwrap(), 2);
    h.drain().await;

    let events = drain_events(&mut events);
    let queue_states: Vec<Vec<i32>> = events
        .iter()
        .filter_map(|event| match event {
            CoreEvent::Sync(SyncEvent::QueueState { anime_tasks }) => {
                Some(anime_tasks.iter().map(|task| task.media_id).collect())
            }
            _ => None,
        })
        .collect();
    assert_eq!(queue_states, vec![vec![1], vec![], vec![2], vec![]]);

    let finished = events
        .iter()
        .filter(|e| **e == CoreEvent::Sync(SyncEvent::Finished))
        .count();
    assert_eq!(finished, 1);
    assert_eq!(
        events.last(),
        Some(&CoreEvent::Sync(SyncEvent::Finished))
    );

    assert!(h.manager.syncer().queue_state().await.is_empty());
    assert_eq!(h.manager.syncer().queue_len().await, 0);
}

#[tokio::test]
async fn test_busy_queue_skips_new_diffs_and_rebuilds_once() {
    let gate = Arc::new(Semaphore::new(0));
    let h = Harness::build(
        "busy",
        create_test_pool().await.unwrap(),
        FakeHttp::gated(gate.clone()),
    )
    .await;
    h.seed(
        vec![
            entry(1, MediaListStatus::Current, 12),
            entry(2, MediaListStatus::Current, 12),
        ],
        &[1],
    )
    .await;
    h.manager.track_anime(1).await.unwrap();
    h.manager.track_anime(2).await.unwrap();

    let mut events = h.event_bus.subscribe();
    assert_eq!(h.manager.synchronize_local().await.unwrap(), 2);
    assert_eq!(h.manager.syncer().queue_len().await, 2);
    assert_eq!(h.manager.synchronize_local().await.unwrap(), 0);

    gate.add_permits(Semaphore::MAX_PERMITS / 2);
    h.drain().await;

    let rebuilds = drain_events(&mut events)
        .into_iter()
        .filter(|e| matches!(e, CoreEvent::Library(LibraryEvent::MirrorRebuilt { .. })))
        .count();
    assert_eq!(rebuilds, 1);
    assert_eq!(
        h.manager.local_anime_collection().await.unwrap().entry_count(),
        2
    );
}

#[tokio::test]
async fn test_panicking_item_is_recorded_and_worker_continues() {
    let h = Harness::new("panic").await;
    h.seed(
        vec![
            entry(7, MediaListStatus::Current, 12),
            entry(8, MediaListStatus::Current, 12),
        ],
        &[1],
    )
    .await;
    h.metadata.panic_on(7).await;
    h.manager.track_anime(7).await.unwrap();
    h.manager.track_anime(8).await.unwrap();

    assert_eq!(h.manager.synchronize_local().await.unwrap(), 2);
    h.drain().await;

    let failed = h.manager.syncer().failed_items().await;
    assert_eq!(failed.len(), 1);
    assert!(failed[&7].reason.starts_with("panic"));
    assert_eq!(failed[&7].failed_at, 1_711_972_800);

    assert!(h.snapshots.find(7).await.unwrap().is_none());
    assert!(h.snapshots.find(8).await.unwrap().is_some());

    // The failed media is still missing and is retried on the next pass.
    assert_eq!(h.manager.synchronize_local().await.unwrap(), 1);
    h.drain().await;
}

#[tokio::test]
async fn test_download_failure_keeps_stores_untouched() {
    let h = Harness::new("download-failure").await;
    h.seed(vec![entry(5, MediaListStatus::Current, 12)], &[1])
        .await;
    h.http.fail("https://img.example/5/cover.png");
    h.manager.track_anime(5).await.unwrap();

    let mut events = h.event_bus.subscribe();
    h.manager.synchronize_local().await.unwrap();
    h.drain().await;

    assert!(h.snapshots.find(5).await.unwrap().is_none());
    assert!(h.manager.is_media_tracked(5).await.unwrap());
    let failed = h.manager.syncer().failed_items().await;
    assert!(failed[&5].reason.contains("404"));

    let events = drain_events(&mut events);
    assert!(events
        .iter()
        .any(|e| matches!(e, CoreEvent::Sync(SyncEvent::ItemFailed { media_id: 5, .. }))));
}

#[tokio::test]
async fn test_missing_metadata_falls_back_to_local_files() {
    let h = Harness::new("fallback").await;
    h.remote
        .set(Some(collection(vec![entry(9, MediaListStatus::Current, 3)])))
        .await;
    h.local_files.set(files(9, [1, 2, 3])).await;
    h.manager.track_anime(9).await.unwrap();

    h.manager.synchronize_local().await.unwrap();
    h.drain().await;

    let snapshot = h.snapshots.find(9).await.unwrap().unwrap();
    assert_eq!(snapshot.metadata.episode_count, 3);
    assert_eq!(snapshot.metadata.episodes.len(), 3);
    assert_eq!(snapshot.episode_image_paths.len(), 3);
    assert!(h.manager.syncer().failed_items().await.is_empty());
}

#[tokio::test]
async fn test_auto_track_current_media() {
    let h = Harness::new("auto-track").await;
    h.remote
        .set(Some(collection(vec![
            entry(1, MediaListStatus::Current, 12),
            entry(2, MediaListStatus::Completed, 12),
            entry(3, MediaListStatus::Current, 12),
        ])))
        .await;
    let mut local = files(1, [1]);
    local.extend(files(2, [1]));
    h.local_files.set(local).await;

    assert!(h.manager.auto_track_current_media().await.unwrap());
    assert!(h.manager.is_media_tracked(1).await.unwrap());
    assert!(!h.manager.is_media_tracked(2).await.unwrap());
    assert!(!h.manager.is_media_tracked(3).await.unwrap());

    assert!(!h.manager.auto_track_current_media().await.unwrap());
}

#[tokio::test]
async fn test_tracked_items_and_offline_metadata() {
    let h = Harness::new("offline").await;
    h.seed(vec![entry(42, MediaListStatus::Current, 12)], &[1, 2])
        .await;
    h.manager.track_anime(42).await.unwrap();

    let items = h.manager.tracked_media_items().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].tracked.created_at, 1_711_972_800);
    assert_eq!(
        items[0].entry.as_ref().unwrap().media.banner_image.as_deref(),
        Some("https://img.example/42/banner.jpg")
    );

    h.manager.synchronize_local().await.unwrap();
    h.drain().await;

    let items = h.manager.tracked_media_items().await.unwrap();
    assert_eq!(
        items[0].entry.as_ref().unwrap().media.banner_image.as_deref(),
        Some("/offline/assets/42/banner.jpg")
    );

    let offline = h.manager.offline_metadata_provider();
    let metadata = offline.get_anime_metadata(42).await.unwrap();
    assert_eq!(
        metadata.episodes["1"].image.as_deref(),
        Some("/offline/assets/42/episodes/1.jpg")
    );
}

#[tokio::test]
async fn test_persisted_mirror_is_loaded_on_startup() {
    let pool = create_test_pool().await.unwrap();
    let first = Harness::build("startup-a", pool.clone(), FakeHttp::default()).await;
    first
        .seed(vec![entry(42, MediaListStatus::Current, 12)], &[1])
        .await;
    first.manager.track_anime(42).await.unwrap();
    first.manager.synchronize_local().await.unwrap();
    first.drain().await;

    let second = Harness::build("startup-b", pool, FakeHttp::default()).await;
    let mirror = second
        .manager
        .local_anime_collection()
        .await
        .expect("mirror loaded from the database");
    assert!(mirror.find_entry(42).is_some());
}
