//! Registry of media that could not be materialized.
//!
//! Last failure wins. An entry is cleared when its media later materializes
//! or is removed. Nothing here retries on its own; the next diff pass picks
//! the media up again.

use core_library::models::AnimeListEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedItem {
    pub entry: AnimeListEntry,
    pub reason: String,
    /// Unix timestamp (seconds)
    pub failed_at: i64,
}

#[derive(Debug, Default)]
pub struct FailedItemRegistry {
    items: Mutex<BTreeMap<i32, FailedItem>>,
}

impl FailedItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, entry: &AnimeListEntry, reason: impl Into<String>, failed_at: i64) {
        self.items.lock().await.insert(
            entry.media_id(),
            FailedItem {
                entry: entry.clone(),
                reason: reason.into(),
                failed_at,
            },
        );
    }

    pub async fn clear(&self, media_id: i32) {
        self.items.lock().await.remove(&media_id);
    }

    pub async fn get(&self, media_id: i32) -> Option<FailedItem> {
        self.items.lock().await.get(&media_id).cloned()
    }

    pub async fn items(&self) -> BTreeMap<i32, FailedItem> {
        self.items.lock().await.clone()
    }
}
