//! Mirror collection repository
//!
//! The rebuilt local collection is a single JSON record per media kind,
//! replaced wholesale on every save.

use crate::error::Result;
use crate::models::{AnimeCollection, MediaKind};
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};
use tracing::debug;

#[async_trait]
pub trait MirrorCollectionRepository: Send + Sync {
    /// The last persisted mirror, `None` before the first rebuild
    async fn load(&self) -> Result<Option<AnimeCollection>>;

    /// Replace the persisted mirror
    async fn save(&self, collection: &AnimeCollection) -> Result<()>;
}

/// SQLite implementation of MirrorCollectionRepository
pub struct SqliteMirrorCollectionRepository {
    pool: SqlitePool,
}

impl SqliteMirrorCollectionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MirrorCollectionRepository for SqliteMirrorCollectionRepository {
    async fn load(&self) -> Result<Option<AnimeCollection>> {
        let row: Option<(String,)> = query_as("SELECT value FROM local_collections WHERE kind = ?")
            .bind(MediaKind::Anime.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((value,)) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, collection: &AnimeCollection) -> Result<()> {
        let value = serde_json::to_string(collection)?;

        query(
            r#"
            INSERT INTO local_collections (kind, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(kind) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(MediaKind::Anime.as_str())
        .bind(value)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        debug!(
            entry_count = collection.entry_count(),
            "Persisted mirror collection"
        );
        Ok(())
    }
}
