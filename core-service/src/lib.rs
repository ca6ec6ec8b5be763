//! Core service façade and bootstrap helpers.
//!
//! This crate wires the host-provided pieces (remote collection, local file
//! inventory, metadata API) and the bridges from [`CoreConfig`] (HTTP, file
//! system) into a ready [`LocalManager`]. Desktop apps typically enable the
//! `desktop-shims` feature so missing bridges fall back to `bridge-desktop`.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::time::{Clock, SystemClock};
use core_library::db::{create_pool, DatabaseConfig};
use core_library::repositories::{
    SqliteMirrorCollectionRepository, SqliteSnapshotRepository, SqliteTrackedMediaRepository,
};
use core_metadata::{AssetStore, HttpAssetDownloader, MetadataProvider};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use core_sync::{LocalFileSource, LocalManager, ManagerDependencies, RemoteCollectionSource, SyncConfig};
use tracing::info;

/// Host-side collaborators the core cannot build on its own.
pub struct CoreDependencies {
    pub remote: Arc<dyn RemoteCollectionSource>,
    pub local_files: Arc<dyn LocalFileSource>,
    pub metadata_provider: Arc<dyn MetadataProvider>,
    pub clock: Arc<dyn Clock>,
}

impl CoreDependencies {
    /// Construct a dependency bundle using the system clock.
    pub fn new(
        remote: Arc<dyn RemoteCollectionSource>,
        local_files: Arc<dyn LocalFileSource>,
        metadata_provider: Arc<dyn MetadataProvider>,
    ) -> Self {
        Self {
            remote,
            local_files,
            metadata_provider,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    manager: Arc<LocalManager>,
    event_bus: EventBus,
}

impl CoreService {
    pub fn manager(&self) -> Arc<LocalManager> {
        Arc::clone(&self.manager)
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Subscribe to queue progress, failures and mirror rebuilds.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }
}

/// Open the mirror database, prepare the asset tree and start the sync worker.
///
/// Must be called from within a tokio runtime.
///
/// ```ignore
/// let config = CoreConfig::builder().data_dir("/data/mirror").build()?;
/// let core = bootstrap(config, CoreDependencies::new(remote, files, metadata)).await?;
///
/// core.manager().synchronize_local().await?;
/// ```
pub async fn bootstrap(config: CoreConfig, deps: CoreDependencies) -> Result<CoreService> {
    config.validate()?;

    let file_system = config.file_system()?;
    let http_client = config.http_client()?;

    if let Some(parent) = config.database_path.parent() {
        file_system.create_dir_all(parent).await.map_err(|e| {
            CoreError::InitializationFailed(format!(
                "Failed to create database directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let pool = create_pool(DatabaseConfig::new(&config.database_path)).await?;

    let assets = Arc::new(AssetStore::new(config.asset_dir.clone(), file_system));
    let downloader = Arc::new(HttpAssetDownloader::new(
        http_client,
        assets.clone(),
        config.download_timeout,
    ));
    let event_bus = EventBus::new(config.event_buffer_size);

    let manager = LocalManager::new(
        SyncConfig::from(&config),
        ManagerDependencies {
            tracked: Arc::new(SqliteTrackedMediaRepository::new(pool.clone())),
            snapshots: Arc::new(SqliteSnapshotRepository::new(pool.clone())),
            mirror: Arc::new(SqliteMirrorCollectionRepository::new(pool)),
            metadata_provider: deps.metadata_provider,
            downloader,
            assets,
            remote: deps.remote,
            local_files: deps.local_files,
            event_bus: event_bus.clone(),
            clock: deps.clock,
        },
    )
    .await?;

    info!(
        database = %config.database_path.display(),
        asset_dir = %config.asset_dir.display(),
        "Core service bootstrapped"
    );

    Ok(CoreService {
        manager: Arc::new(manager),
        event_bus,
    })
}
