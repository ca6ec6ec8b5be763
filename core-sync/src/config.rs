//! Sync engine settings derived from [`CoreConfig`].

use core_runtime::config::{CoreConfig, DEFAULT_ASSET_URL_PREFIX, DEFAULT_QUEUE_CAPACITY};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Capacity of the bounded work queue
    pub queue_capacity: usize,

    /// Prefix of the URLs written into the mirror collection
    pub asset_url_prefix: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            asset_url_prefix: DEFAULT_ASSET_URL_PREFIX.to_string(),
        }
    }
}

impl From<&CoreConfig> for SyncConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            asset_url_prefix: config.asset_url_prefix.clone(),
        }
    }
}
