//! Review model and repository.
//!
//! Reviews are dependents of an artifact: they are read for the detail view
//! and batch-deleted with the artifact. Review authoring policy lives
//! outside this subsystem.

use sqlx::SqlitePool;

use crate::{DepotError, Result};

/// A review left on an artifact.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Review {
    /// Unique review ID.
    pub id: i64,
    /// Reviewed artifact.
    pub artifact_id: i64,
    /// Authoring account.
    pub author_id: i64,
    /// Star rating.
    pub rating: i64,
    /// Review text.
    pub body: String,
    /// Creation timestamp.
    pub created_at: String,
}

/// Data for creating a new review.
#[derive(Debug, Clone)]
pub struct NewReview {
    /// Reviewed artifact.
    pub artifact_id: i64,
    /// Authoring account.
    pub author_id: i64,
    /// Star rating.
    pub rating: i64,
    /// Review text.
    pub body: String,
}

impl NewReview {
    /// Create a new NewReview.
    pub fn new(artifact_id: i64, author_id: i64, rating: i64, body: impl Into<String>) -> Self {
        Self {
            artifact_id,
            author_id,
            rating,
            body: body.into(),
        }
    }
}

/// Repository for review rows.
pub struct ReviewRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new ReviewRepository with the given pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a review row.
    pub async fn create(&self, new_review: &NewReview) -> Result<Review> {
        let result = sqlx::query(
            "INSERT INTO reviews (artifact_id, author_id, rating, body) VALUES (?, ?, ?, ?)",
        )
        .bind(new_review.artifact_id)
        .bind(new_review.author_id)
        .bind(new_review.rating)
        .bind(&new_review.body)
        .execute(self.pool)
        .await?;

        let id = result.last_insert_rowid();
        let review = sqlx::query_as::<_, Review>(
            "SELECT id, artifact_id, author_id, rating, body, created_at
             FROM reviews WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        review.ok_or_else(|| DepotError::NotFound("review".to_string()))
    }

    /// List the reviews of an artifact, oldest first.
    pub async fn list_by_artifact(&self, artifact_id: i64) -> Result<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(
            "SELECT id, artifact_id, author_id, rating, body, created_at
             FROM reviews WHERE artifact_id = ? ORDER BY id",
        )
        .bind(artifact_id)
        .fetch_all(self.pool)
        .await?;

        Ok(reviews)
    }
}
