//! # Core Configuration
//!
//! Configuration for the offline mirror: where the database and the asset
//! tree live, how asset URLs are served, how large the sync queue is, and
//! which host bridges to use.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/data/mirror/local.db")
//!     .asset_dir("/data/mirror/assets")
//!     .queue_capacity(100)
//!     .build()?;
//!
//! let http = config.http_client()?;
//! ```
//!
//! ## Bridges
//!
//! `http_client` and `file_system` are optional on the builder. With the
//! `desktop-shims` feature, missing bridges fall back to the `bridge-desktop`
//! adapters at build time. Without it, asking for a missing bridge returns
//! [`Error::CapabilityMissing`].

use crate::error::{Error, Result};
use bridge_traits::{FileSystemAccess, HttpClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default capacity of the background sync queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Upper bound accepted for the sync queue capacity.
pub const MAX_QUEUE_CAPACITY: usize = 10_000;

/// URL prefix under which the host serves the asset directory.
pub const DEFAULT_ASSET_URL_PREFIX: &str = "/offline/assets";

/// Default per-request timeout for image downloads.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct CoreConfig {
    /// SQLite database holding tracked media, snapshots and the mirror.
    pub database_path: PathBuf,

    /// Root of the asset tree (`{asset_dir}/{media_id}/...`).
    pub asset_dir: PathBuf,

    /// Prefix used when turning stored relative asset paths into URLs.
    pub asset_url_prefix: String,

    /// Capacity of the bounded sync queue. Producers wait when it is full.
    pub queue_capacity: usize,

    /// Buffer size of the event bus broadcast channel.
    pub event_buffer_size: usize,

    pub download_timeout: Duration,

    pub http_client: Option<Arc<dyn HttpClient>>,

    pub file_system: Option<Arc<dyn FileSystemAccess>>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("asset_dir", &self.asset_dir)
            .field("asset_url_prefix", &self.asset_url_prefix)
            .field("queue_capacity", &self.queue_capacity)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("download_timeout", &self.download_timeout)
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field(
                "file_system",
                &self
                    .file_system
                    .as_ref()
                    .map(|_| "FileSystemAccess { ... }"),
            )
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.asset_dir.as_os_str().is_empty() {
            return Err(Error::Config("Asset directory cannot be empty".to_string()));
        }

        if self.asset_url_prefix.is_empty() {
            return Err(Error::Config(
                "Asset URL prefix cannot be empty".to_string(),
            ));
        }

        if self.asset_url_prefix.ends_with('/') {
            return Err(Error::Config(
                "Asset URL prefix must not end with '/'".to_string(),
            ));
        }

        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(Error::Config(format!(
                "Queue capacity must be between 1 and {}",
                MAX_QUEUE_CAPACITY
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.download_timeout.is_zero() {
            return Err(Error::Config(
                "Download timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The configured HTTP bridge.
    pub fn http_client(&self) -> Result<Arc<dyn HttpClient>> {
        self.http_client.clone().ok_or_else(|| Error::CapabilityMissing {
            capability: "HttpClient".to_string(),
            message: "HttpClient implementation is required to download artwork. \
                      Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                      Other hosts: inject a platform HTTP adapter."
                .to_string(),
        })
    }

    /// The configured file system bridge.
    pub fn file_system(&self) -> Result<Arc<dyn FileSystemAccess>> {
        self.file_system.clone().ok_or_else(|| Error::CapabilityMissing {
            capability: "FileSystemAccess".to_string(),
            message: "FileSystemAccess implementation is required to store artwork. \
                      Desktop: enable the 'desktop-shims' feature to use TokioFileSystem. \
                      Other hosts: inject a platform file system adapter."
                .to_string(),
        })
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Option<Arc<dyn HttpClient>>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new(timeout)
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(Some(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Option<Arc<dyn HttpClient>>> {
    Ok(None)
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Option<Arc<dyn FileSystemAccess>> {
    let fs: Arc<dyn FileSystemAccess> = Arc::new(bridge_desktop::TokioFileSystem::new());
    Some(fs)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Option<Arc<dyn FileSystemAccess>> {
    None
}

#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    asset_dir: Option<PathBuf>,
    asset_url_prefix: Option<String>,
    queue_capacity: Option<usize>,
    event_buffer_size: Option<usize>,
    download_timeout: Option<Duration>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
}

impl CoreConfigBuilder {
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn asset_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.asset_dir = Some(path.into());
        self
    }

    /// Use `data_dir/local.db` and `data_dir/assets` unless set explicitly.
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        let dir = path.into();
        if self.database_path.is_none() {
            self.database_path = Some(dir.join("local.db"));
        }
        if self.asset_dir.is_none() {
            self.asset_dir = Some(dir.join("assets"));
        }
        self
    }

    /// [`data_dir`](Self::data_dir) pointed at the platform data directory.
    #[cfg(feature = "desktop-shims")]
    pub fn platform_data_dir(self) -> Self {
        self.data_dir(bridge_desktop::default_data_dir())
    }

    pub fn asset_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.asset_url_prefix = Some(prefix.into());
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = Some(timeout);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config(
                "Database path is required. Use .database_path() or .data_dir() to set it."
                    .to_string(),
            )
        })?;

        let asset_dir = self.asset_dir.ok_or_else(|| {
            Error::Config(
                "Asset directory is required. Use .asset_dir() or .data_dir() to set it."
                    .to_string(),
            )
        })?;

        let download_timeout = self.download_timeout.unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => Some(client),
            None => provide_default_http_client(download_timeout)?,
        };

        let file_system = self.file_system.or_else(provide_default_file_system);

        let config = CoreConfig {
            database_path,
            asset_dir,
            asset_url_prefix: self
                .asset_url_prefix
                .unwrap_or_else(|| DEFAULT_ASSET_URL_PREFIX.to_string()),
            queue_capacity: self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
            download_timeout,
            http_client,
            file_system,
        };

        config.validate()?;

        Ok(config)
    }
}
