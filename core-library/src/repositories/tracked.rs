//! Tracked media repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{MediaKind, TrackedMedia};
use async_trait::async_trait;
use sqlx::{query, sqlite::SqliteRow, Row, SqlitePool};

/// Tracked media repository interface
#[async_trait]
pub trait TrackedMediaRepository: Send + Sync {
    /// Find the tracking record for a media id
    async fn find(&self, media_id: i32, kind: MediaKind) -> Result<Option<TrackedMedia>>;

    /// All tracking records of a kind, ordered by media id
    async fn find_all(&self, kind: MediaKind) -> Result<Vec<TrackedMedia>>;

    /// Insert a new tracking record
    ///
    /// # Errors
    /// Returns `AlreadyExists` if the media id is already tracked for this kind.
    async fn insert(&self, record: &TrackedMedia) -> Result<()>;

    /// Delete a tracking record
    ///
    /// # Returns
    /// - `Ok(true)` if the record was deleted
    /// - `Ok(false)` if nothing was tracked
    async fn delete(&self, media_id: i32, kind: MediaKind) -> Result<bool>;
}

/// SQLite implementation of TrackedMediaRepository
pub struct SqliteTrackedMediaRepository {
    pool: SqlitePool,
}

impl SqliteTrackedMediaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn from_row(row: &SqliteRow) -> Result<TrackedMedia> {
        let kind: String = row.try_get("kind")?;
        Ok(TrackedMedia {
            media_id: row.try_get("media_id")?,
            kind: kind.parse()?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl TrackedMediaRepository for SqliteTrackedMediaRepository {
    async fn find(&self, media_id: i32, kind: MediaKind) -> Result<Option<TrackedMedia>> {
        let row = query("SELECT * FROM tracked_media WHERE media_id = ? AND kind = ?")
            .bind(media_id)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn find_all(&self, kind: MediaKind) -> Result<Vec<TrackedMedia>> {
        let rows = query("SELECT * FROM tracked_media WHERE kind = ? ORDER BY media_id ASC")
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn insert(&self, record: &TrackedMedia) -> Result<()> {
        query("INSERT INTO tracked_media (media_id, kind, created_at) VALUES (?, ?, ?)")
            .bind(record.media_id)
            .bind(record.kind.as_str())
            .bind(record.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                    LibraryError::AlreadyExists {
                        entity_type: "TrackedMedia".to_string(),
                        id: record.media_id.to_string(),
                    }
                }
                _ => LibraryError::Database(e),
            })?;

        Ok(())
    }

    async fn delete(&self, media_id: i32, kind: MediaKind) -> Result<bool> {
        let result = query("DELETE FROM tracked_media WHERE media_id = ? AND kind = ?")
            .bind(media_id)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
