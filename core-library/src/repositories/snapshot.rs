//! Anime snapshot repository trait and implementation
//!
//! Metadata and the episode image map are stored as JSON text columns.

use crate::error::Result;
use crate::models::AnimeSnapshot;
use async_trait::async_trait;
use sqlx::{query, sqlite::SqliteRow, Row, SqlitePool};

#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    async fn find(&self, media_id: i32) -> Result<Option<AnimeSnapshot>>;

    /// All snapshots, ordered by media id
    async fn find_all(&self) -> Result<Vec<AnimeSnapshot>>;

    /// Insert or replace the snapshot for its media id
    async fn save(&self, snapshot: &AnimeSnapshot) -> Result<()>;

    /// Delete the snapshot of a media id, `Ok(false)` when there was none
    async fn delete(&self, media_id: i32) -> Result<bool>;
}

/// SQLite implementation of SnapshotRepository
pub struct SqliteSnapshotRepository {
    pool: SqlitePool,
}

impl SqliteSnapshotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn from_row(row: &SqliteRow) -> Result<AnimeSnapshot> {
        let metadata: String = row.try_get("metadata")?;
        let episode_image_paths: String = row.try_get("episode_image_paths")?;

        Ok(AnimeSnapshot {
            media_id: row.try_get("media_id")?,
            metadata: serde_json::from_str(&metadata)?,
            banner_image_path: row.try_get("banner_image_path")?,
            cover_image_path: row.try_get("cover_image_path")?,
            episode_image_paths: serde_json::from_str(&episode_image_paths)?,
            reference_key: row.try_get("reference_key")?,
        })
    }
}

#[async_trait]
impl SnapshotRepository for SqliteSnapshotRepository {
    async fn find(&self, media_id: i32) -> Result<Option<AnimeSnapshot>> {
        let row = query("SELECT * FROM anime_snapshots WHERE media_id = ?")
            .bind(media_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn find_all(&self) -> Result<Vec<AnimeSnapshot>> {
        let rows = query("SELECT * FROM anime_snapshots ORDER BY media_id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn save(&self, snapshot: &AnimeSnapshot) -> Result<()> {
        let metadata = serde_json::to_string(&snapshot.metadata)?;
        let episode_image_paths = serde_json::to_string(&snapshot.episode_image_paths)?;

        query(
            r#"
            INSERT INTO anime_snapshots (
                media_id, metadata, banner_image_path, cover_image_path,
                episode_image_paths, reference_key, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(media_id) DO UPDATE SET
                metadata = excluded.metadata,
                banner_image_path = excluded.banner_image_path,
                cover_image_path = excluded.cover_image_path,
                episode_image_paths = excluded.episode_image_paths,
                reference_key = excluded.reference_key,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(snapshot.media_id)
        .bind(metadata)
        .bind(&snapshot.banner_image_path)
        .bind(&snapshot.cover_image_path)
        .bind(episode_image_paths)
        .bind(&snapshot.reference_key)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, media_id: i32) -> Result<bool> {
        let result = query("DELETE FROM anime_snapshots WHERE media_id = ?")
            .bind(media_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::{AnimeMetadata, EpisodeMetadata};
    use std::collections::BTreeMap;

    async fn setup_repo() -> SqliteSnapshotRepository {
        SqliteSnapshotRepository::new(create_test_pool().await.unwrap())
    }

    fn snapshot(media_id: i32, reference_key: &str) -> AnimeSnapshot {
        let mut episodes = BTreeMap::new();
        episodes.insert(
            "1".to_string(),
            EpisodeMetadata {
                episode: "1".to_string(),
                episode_number: 1,
                title: Some("Pilot".to_string()),
                image: Some("https://img.example.com/ep1.jpg".to_string()),
                ..Default::default()
            },
        );

        AnimeSnapshot {
            media_id,
            metadata: AnimeMetadata {
                episode_count: 12,
                episodes,
                ..Default::default()
            },
            banner_image_path: Some("banner.jpg".to_string()),
            cover_image_path: None,
            episode_image_paths: BTreeMap::from([("1".to_string(), "episodes/1.jpg".to_string())]),
            reference_key: reference_key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let repo = setup_repo().await;
        let original = snapshot(42, "key-a");
        repo.save(&original).await.unwrap();

        let found = repo.find(42).await.unwrap().unwrap();
        assert_eq!(found, original);
        assert_eq!(found.cover_image_path, None);
    }

    #[tokio::test]
    async fn test_save_replaces_existing() {
        let repo = setup_repo().await;
        repo.save(&snapshot(42, "key-a")).await.unwrap();

        let mut updated = snapshot(42, "key-b");
        updated
            .episode_image_paths
            .insert("2".to_string(), "episodes/2.jpg".to_string());
        repo.save(&updated).await.unwrap();

        let all = repo.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].reference_key, "key-b");
        assert_eq!(all[0].episode_image_paths.len(), 2);
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = setup_repo().await;
        repo.save(&snapshot(1, "k")).await.unwrap();
        repo.save(&snapshot(2, "k")).await.unwrap();

        assert!(repo.delete(1).await.unwrap());
        assert!(!repo.delete(1).await.unwrap());

        let remaining: Vec<i32> = repo
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.media_id)
            .collect();
        assert_eq!(remaining, vec![2]);
    }
}
