//! # Sync Queue
//!
//! Bounded FIFO of [`AnimeDiffResult`]s drained by a single worker task.
//!
//! ## Lifecycle of an item
//!
//! ```text
//! enqueued -> processing -> persisted | removed | failed -> gone from QueueState
//! ```
//!
//! The worker publishes `SyncEvent::QueueState` when an item starts and when
//! it leaves. When the last queued item finishes, the mirror collection is
//! rebuilt once, `SyncEvent::Finished` is published and the completion
//! signal fires.
//!
//! ## Locks
//!
//! - coordination: the dirty flag, the number of queued items and the batch
//!   generation. Shared by [`Syncer::run_diffs`] and the drain check.
//! - queue state: the items currently being processed.
//!
//! Neither lock is held while the stores are read, metadata is fetched,
//! images are downloaded or the mirror is rebuilt. A diff pass reads its
//! inputs unlocked and only schedules if no other pass scheduled a batch in
//! the meantime.
//!
//! ## Backpressure
//!
//! Enqueueing happens on a spawned task that waits for free capacity, so a
//! large diff pass never drops items and never blocks the caller.

use crate::config::SyncConfig;
use crate::diff::{compute_anime_diffs, AnimeDiffResult, DiffInput};
use crate::error::Result;
use crate::failed::{FailedItem, FailedItemRegistry};
use crate::materializer::{MaterializeOutcome, SnapshotMaterializer};
use crate::mirror::build_mirror_collection;
use crate::state::SyncState;
use core_library::models::{AnimeListEntry, MediaKind};
use core_library::repositories::{
    MirrorCollectionRepository, SnapshotRepository, TrackedMediaRepository,
};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, QueuedMedia, SyncEvent};
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, instrument, warn};

/// Stores the syncer reads from when diffing and rebuilding.
#[derive(Clone)]
pub struct SyncStores {
    pub tracked: Arc<dyn TrackedMediaRepository>,
    pub snapshots: Arc<dyn SnapshotRepository>,
    pub mirror: Arc<dyn MirrorCollectionRepository>,
}

#[derive(Debug, Default)]
struct Coordination {
    dirty: bool,
    queued: usize,
    /// Bumped every time a batch is scheduled.
    generation: u64,
}

impl Coordination {
    /// Reserve `count` queue slots unless the queue got busy or another
    /// batch was scheduled since `seen`.
    fn try_schedule(&mut self, seen: u64, count: usize) -> bool {
        if self.queued > 0 || self.generation != seen {
            return false;
        }
        self.queued += count;
        self.generation += 1;
        true
    }

    /// Consume the dirty flag when nothing is left in the queue.
    fn take_rebuild(&mut self) -> bool {
        if self.dirty && self.queued == 0 {
            self.dirty = false;
            true
        } else {
            false
        }
    }
}

struct SyncerInner {
    config: SyncConfig,
    sender: mpsc::Sender<AnimeDiffResult>,
    coordination: Mutex<Coordination>,
    queue_state: Mutex<BTreeMap<i32, QueuedMedia>>,
    completion_tx: mpsc::Sender<()>,
    completion_rx: Mutex<mpsc::Receiver<()>>,
    materializer: Arc<SnapshotMaterializer>,
    stores: SyncStores,
    state: Arc<SyncState>,
    failed: Arc<FailedItemRegistry>,
    event_bus: EventBus,
}

/// Handle to the sync queue. Cloning shares the same queue and worker.
///
/// The worker stops once every handle is dropped.
#[derive(Clone)]
pub struct Syncer {
    inner: Arc<SyncerInner>,
}

impl Syncer {
    /// Create the queue and spawn its worker on the current tokio runtime.
    pub fn new(
        config: SyncConfig,
        materializer: Arc<SnapshotMaterializer>,
        stores: SyncStores,
        state: Arc<SyncState>,
        failed: Arc<FailedItemRegistry>,
        event_bus: EventBus,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (completion_tx, completion_rx) = mpsc::channel(1);

        let inner = Arc::new(SyncerInner {
            config,
            sender,
            coordination: Mutex::new(Coordination::default()),
            queue_state: Mutex::new(BTreeMap::new()),
            completion_tx,
            completion_rx: Mutex::new(completion_rx),
            materializer,
            stores,
            state,
            failed,
            event_bus,
        });

        tokio::spawn(run_worker(Arc::downgrade(&inner), receiver));

        Self { inner }
    }

    /// Diff the current state and enqueue the results.
    ///
    /// Returns the number of enqueued items. Does nothing and returns `0`
    /// while the queue still holds work or when a concurrent pass scheduled
    /// its batch first.
    #[instrument(skip(self))]
    pub async fn run_diffs(&self) -> Result<usize> {
        let seen = {
            let coordination = self.inner.coordination.lock().await;
            if coordination.queued > 0 {
                debug!(queued = coordination.queued, "Queue busy, skipping diff pass");
                return Ok(0);
            }
            coordination.generation
        };

        let Some(remote) = self.inner.state.remote_collection().await else {
            debug!("No remote collection yet, nothing to diff");
            return Ok(0);
        };
        let local_files = self.inner.state.local_files().await;
        let tracked = self.inner.stores.tracked.find_all(MediaKind::Anime).await?;
        let snapshots = self.inner.stores.snapshots.find_all().await?;

        let diffs = compute_anime_diffs(DiffInput {
            remote: &remote,
            local_files: &local_files,
            tracked: &tracked,
            snapshots: &snapshots,
        });

        let count = diffs.len();
        if count == 0 {
            debug!("Everything up to date");
            return Ok(0);
        }

        if !self.inner.coordination.lock().await.try_schedule(seen, count) {
            debug!("Another diff pass scheduled first, skipping");
            return Ok(0);
        }

        info!(count, "Enqueueing anime diffs");
        let sender = self.inner.sender.clone();
        tokio::spawn(async move {
            for diff in diffs {
                if sender.send(diff).await.is_err() {
                    warn!("Sync worker stopped, dropping remaining diffs");
                    break;
                }
            }
        });

        Ok(count)
    }

    /// Rebuild the mirror now if the queue is idle. A busy queue rebuilds on
    /// its own once drained.
    pub async fn refresh_collections(&self) {
        let rebuild = {
            let mut coordination = self.inner.coordination.lock().await;
            if coordination.queued == 0 {
                coordination.dirty = true;
                coordination.take_rebuild()
            } else {
                false
            }
        };

        if rebuild {
            self.inner.finish_batch().await;
        }
    }

    /// Items currently being processed, keyed by media id.
    pub async fn queue_state(&self) -> BTreeMap<i32, QueuedMedia> {
        self.inner.queue_state.lock().await.clone()
    }

    /// Number of items enqueued but not yet finished.
    pub async fn queue_len(&self) -> usize {
        self.inner.coordination.lock().await.queued
    }

    pub async fn failed_items(&self) -> BTreeMap<i32, FailedItem> {
        self.inner.failed.items().await
    }

    /// Wait for the next drained batch. Returns immediately if a completion
    /// was signalled and not consumed yet.
    pub async fn wait_for_completion(&self) {
        self.inner.completion_rx.lock().await.recv().await;
    }
}

async fn run_worker(inner: Weak<SyncerInner>, mut receiver: mpsc::Receiver<AnimeDiffResult>) {
    debug!("Sync worker started");

    while let Some(diff) = receiver.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.process(diff).await;
    }

    debug!("Sync worker stopped");
}

impl SyncerInner {
    async fn process(&self, diff: AnimeDiffResult) {
        let media_id = diff.media_id();
        self.set_processing(&diff.entry).await;

        let outcome = AssertUnwindSafe(self.materializer.materialize(&diff))
            .catch_unwind()
            .await;

        match outcome {
            Ok(MaterializeOutcome::Failed(reason)) => {
                debug!(media_id, reason = %reason, "Item failed");
            }
            Ok(outcome) => debug!(media_id, ?outcome, "Item done"),
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(media_id, reason = %reason, "Item panicked");
                self.materializer.record_failure(&diff.entry, reason).await;
            }
        }

        self.clear_processing(media_id).await;

        let rebuild = {
            let mut coordination = self.coordination.lock().await;
            coordination.queued = coordination.queued.saturating_sub(1);
            coordination.dirty = true;
            coordination.take_rebuild()
        };

        if rebuild {
            self.finish_batch().await;
        }
    }

    async fn set_processing(&self, entry: &AnimeListEntry) {
        let mut queue_state = self.queue_state.lock().await;
        queue_state.insert(
            entry.media_id(),
            QueuedMedia {
                media_id: entry.media_id(),
                image: entry.media.cover_url().unwrap_or_default().to_string(),
                title: entry.media.preferred_title().to_string(),
                kind: MediaKind::Anime.to_string(),
            },
        );
        self.publish_queue_state(&queue_state);
    }

    async fn clear_processing(&self, media_id: i32) {
        let mut queue_state = self.queue_state.lock().await;
        queue_state.remove(&media_id);
        self.publish_queue_state(&queue_state);
    }

    fn publish_queue_state(&self, queue_state: &BTreeMap<i32, QueuedMedia>) {
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::QueueState {
                anime_tasks: queue_state.values().cloned().collect(),
            }))
            .ok();
    }

    async fn finish_batch(&self) {
        self.rebuild_mirror().await;

        self.event_bus.emit(CoreEvent::Sync(SyncEvent::Finished)).ok();
        // A pending signal already covers this batch.
        self.completion_tx.try_send(()).ok();
    }

    #[instrument(skip(self))]
    async fn rebuild_mirror(&self) {
        let Some(remote) = self.state.remote_collection().await else {
            warn!("No remote collection, skipping mirror rebuild");
            return;
        };

        let tracked = match self.stores.tracked.find_all(MediaKind::Anime).await {
            Ok(tracked) => tracked,
            Err(e) => {
                error!(error = %e, "Failed to load tracked media");
                return;
            }
        };
        let snapshots = match self.stores.snapshots.find_all().await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                error!(error = %e, "Failed to load snapshots");
                return;
            }
        };

        let mirror =
            build_mirror_collection(&remote, &snapshots, &tracked, &self.config.asset_url_prefix);
        let entry_count = mirror.entry_count();

        if let Err(e) = self.stores.mirror.save(&mirror).await {
            error!(error = %e, "Failed to persist mirror collection");
            return;
        }

        match self.stores.mirror.load().await {
            Ok(stored) => self.state.set_mirror(stored).await,
            Err(e) => error!(error = %e, "Failed to reload mirror collection"),
        }

        info!(entry_count, "Mirror collection rebuilt");
        self.event_bus
            .emit(CoreEvent::Library(LibraryEvent::MirrorRebuilt { entry_count }))
            .ok();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panic: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panic: {}", message)
    } else {
        "panic".to_string()
    }
}
