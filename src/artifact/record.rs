//! Artifact model and repository.

use sqlx::SqlitePool;

use crate::{DepotError, Result};

/// A published application package record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Artifact {
    /// Unique artifact ID.
    pub id: i64,
    /// Owning account.
    pub owner_id: i64,
    /// Logical name, unique across all accounts.
    pub name: String,
    /// Category label.
    pub category: String,
    /// Free-text description.
    pub description: String,
    /// Size in whole megabytes, rounded up.
    pub size_mb: i64,
    /// Public storage URL of the main blob.
    pub url: String,
    /// Public storage URL of the icon.
    pub icon_url: String,
    /// Download counter.
    pub downloads: i64,
    /// Creation timestamp.
    pub created_at: String,
}

/// Data for creating a new artifact row.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    /// Owning account.
    pub owner_id: i64,
    /// Logical name, unique across all accounts.
    pub name: String,
    /// Category label.
    pub category: String,
    /// Free-text description.
    pub description: String,
    /// Size in whole megabytes, rounded up.
    pub size_mb: i64,
    /// Public storage URL of the main blob.
    pub url: String,
    /// Public storage URL of the icon.
    pub icon_url: String,
}

/// Repository for artifact metadata operations.
pub struct ArtifactRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ArtifactRepository<'a> {
    /// Create a new ArtifactRepository with the given pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an artifact row, returning the stored record with its
    /// generated id.
    pub async fn create(&self, new_artifact: &NewArtifact) -> Result<Artifact> {
        let result = sqlx::query(
            "INSERT INTO artifacts (owner_id, name, category, description, size_mb, url, icon_url)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new_artifact.owner_id)
        .bind(&new_artifact.name)
        .bind(&new_artifact.category)
        .bind(&new_artifact.description)
        .bind(new_artifact.size_mb)
        .bind(&new_artifact.url)
        .bind(&new_artifact.icon_url)
        .execute(self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DepotError::NotFound("artifact".to_string()))
    }

    /// Get an artifact by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Artifact>> {
        let artifact = sqlx::query_as::<_, Artifact>(
            "SELECT id, owner_id, name, category, description, size_mb, url, icon_url,
                    downloads, created_at
             FROM artifacts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(artifact)
    }

    /// List all artifacts, newest first.
    pub async fn list(&self) -> Result<Vec<Artifact>> {
        let artifacts = sqlx::query_as::<_, Artifact>(
            "SELECT id, owner_id, name, category, description, size_mb, url, icon_url,
                    downloads, created_at
             FROM artifacts ORDER BY id DESC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(artifacts)
    }

    /// List an owner's artifacts, newest first.
    pub async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Artifact>> {
        let artifacts = sqlx::query_as::<_, Artifact>(
            "SELECT id, owner_id, name, category, description, size_mb, url, icon_url,
                    downloads, created_at
             FROM artifacts WHERE owner_id = ? ORDER BY id DESC",
        )
        .bind(owner_id)
        .fetch_all(self.pool)
        .await?;

        Ok(artifacts)
    }

    /// Count artifacts held by an owner.
    pub async fn count_by_owner(&self, owner_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artifacts WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Check whether a logical name is already taken.
    pub async fn name_taken(&self, name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artifacts WHERE name = ?")
            .bind(name)
            .fetch_one(self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Update the description.
    pub async fn update_description(&self, id: i64, description: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE artifacts SET description = ? WHERE id = ?")
            .bind(description)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update the main blob's size and URL together.
    pub async fn update_main(&self, id: i64, size_mb: i64, url: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE artifacts SET size_mb = ?, url = ? WHERE id = ?")
            .bind(size_mb)
            .bind(url)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update the icon URL.
    pub async fn update_icon_url(&self, id: i64, icon_url: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE artifacts SET icon_url = ? WHERE id = ?")
            .bind(icon_url)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Increment the download counter.
    pub async fn increment_downloads(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE artifacts SET downloads = downloads + 1 WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete an artifact together with its media and review rows in one
    /// batched deletion.
    pub async fn delete_cascade(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM media_assets WHERE artifact_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM reviews WHERE artifact_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM artifacts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
