//! Media asset model and repository.
//!
//! A media asset is one preview image attached to an artifact; an artifact
//! holds at most [`MAX_MEDIA_ASSETS`](super::MAX_MEDIA_ASSETS) of them. The
//! ceiling itself is enforced by the lifecycle service, not here.

use sqlx::SqlitePool;

use crate::Result;

/// One preview media file belonging to an artifact.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MediaAsset {
    /// Unique media asset ID.
    pub id: i64,
    /// Owning artifact.
    pub artifact_id: i64,
    /// Public storage URL.
    pub url: String,
}

/// Repository for media asset rows.
pub struct MediaRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MediaRepository<'a> {
    /// Create a new MediaRepository with the given pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a media row for an artifact.
    pub async fn insert(&self, artifact_id: i64, url: &str) -> Result<MediaAsset> {
        let result = sqlx::query("INSERT INTO media_assets (artifact_id, url) VALUES (?, ?)")
            .bind(artifact_id)
            .bind(url)
            .execute(self.pool)
            .await?;

        Ok(MediaAsset {
            id: result.last_insert_rowid(),
            artifact_id,
            url: url.to_string(),
        })
    }

    /// List the media URLs of an artifact, oldest first.
    pub async fn list_urls(&self, artifact_id: i64) -> Result<Vec<String>> {
        let urls: Vec<String> =
            sqlx::query_scalar("SELECT url FROM media_assets WHERE artifact_id = ? ORDER BY id")
                .bind(artifact_id)
                .fetch_all(self.pool)
                .await?;
        Ok(urls)
    }

    /// Count the media assets of an artifact.
    pub async fn count(&self, artifact_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM media_assets WHERE artifact_id = ?")
                .bind(artifact_id)
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }

    /// Delete a media row by its URL.
    pub async fn delete_by_url(&self, url: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM media_assets WHERE url = ?")
            .bind(url)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
