//! Artifact lifecycle service.
//!
//! Top-level orchestrator composing the quota policy, storage placement and
//! the metadata store to implement create, update and remove. Metadata
//! writes and filesystem mutations are two independently-failing steps with
//! no spanning transaction: rejected requests fail before any side effect,
//! but a failure in a later step never rolls back an earlier one, and
//! file-deletion failures are downgraded to warnings.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::AccountRepository;
use crate::locks::LockMap;
use crate::placement::StoragePlacement;
use crate::policy::PlanPolicy;
use crate::{DepotError, Result};

use super::media::MediaRepository;
use super::record::{Artifact, ArtifactRepository, NewArtifact};
use super::review::{Review, ReviewRepository};
use super::MAX_MEDIA_ASSETS;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Required fields for a new artifact.
#[derive(Debug, Clone)]
pub struct NewArtifactRequest {
    /// Logical name, unique across all accounts.
    pub name: String,
    /// Category label.
    pub category: String,
    /// Free-text description.
    pub description: String,
}

/// An already-staged file to be placed into artifact storage.
///
/// Typically the output of assembly (main blob) or a directly staged upload
/// (icon, media). The original filename is only used for its extension.
#[derive(Debug, Clone)]
pub struct BlobSource {
    /// Location of the staged file.
    pub path: PathBuf,
    /// Original filename as uploaded.
    pub original_name: String,
}

impl BlobSource {
    /// Create a new BlobSource.
    pub fn new(path: impl Into<PathBuf>, original_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            original_name: original_name.into(),
        }
    }
}

/// Patch for updating an artifact. Every part is independently optional.
#[derive(Debug, Clone, Default)]
pub struct ArtifactPatch {
    /// Replacement description. Empty text is a validation error.
    pub description: Option<String>,
    /// Storage URLs of media assets to delete.
    pub remove_media: Vec<String>,
    /// Replacement main blob.
    pub new_main: Option<BlobSource>,
    /// Replacement icon.
    pub new_icon: Option<BlobSource>,
    /// Media assets to add, subject to the 4-per-artifact ceiling.
    pub new_media: Vec<BlobSource>,
}

/// Artifact detail: the record plus its media URLs and reviews.
#[derive(Debug, Clone)]
pub struct ArtifactDetail {
    /// The artifact record.
    pub artifact: Artifact,
    /// Media URLs, oldest first.
    pub media: Vec<String>,
    /// Reviews, oldest first.
    pub reviews: Vec<Review>,
}

/// Result of a reconciliation pass over one owner's storage.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Stored URLs whose backing file is missing (dangling records).
    pub missing_files: Vec<String>,
    /// Directories under the owner's storage with no referencing record
    /// (orphan blobs).
    pub orphan_dirs: Vec<PathBuf>,
}

impl ReconcileReport {
    /// Whether metadata and filesystem agree.
    pub fn is_clean(&self) -> bool {
        self.missing_files.is_empty() && self.orphan_dirs.is_empty()
    }
}

/// Lifecycle coordinator for artifacts.
///
/// Storage-mutating operations on the same artifact (update, remove) are
/// mutually exclusive per artifact id.
pub struct ArtifactService {
    pool: SqlitePool,
    placement: StoragePlacement,
    policy: PlanPolicy,
    locks: LockMap<i64>,
}

impl ArtifactService {
    /// Create a new ArtifactService.
    pub fn new(pool: SqlitePool, placement: StoragePlacement, policy: PlanPolicy) -> Self {
        Self {
            pool,
            placement,
            policy,
            locks: LockMap::new(),
        }
    }

    /// Get the placement manager used by this service.
    pub fn placement(&self) -> &StoragePlacement {
        &self.placement
    }

    /// Publish a new artifact.
    ///
    /// Checks run in order — required fields, name availability, count
    /// quota, size ceiling — and the first failure aborts with no side
    /// effects. On success the blobs are placed into a fresh storage
    /// directory, the artifact row is inserted, and at most four media rows
    /// follow; media blobs beyond the fourth are silently dropped. A media
    /// insert failure does not roll back the artifact insert.
    pub async fn create(
        &self,
        owner_id: i64,
        fields: &NewArtifactRequest,
        main_blob: BlobSource,
        icon_blob: BlobSource,
        media_blobs: Vec<BlobSource>,
    ) -> Result<i64> {
        if fields.name.trim().is_empty()
            || fields.category.trim().is_empty()
            || fields.description.trim().is_empty()
        {
            return Err(DepotError::Validation(
                "name, category and description are required".to_string(),
            ));
        }

        let artifacts = ArtifactRepository::new(&self.pool);
        if artifacts.name_taken(&fields.name).await? {
            return Err(DepotError::Conflict(format!(
                "artifact name \"{}\" is already taken",
                fields.name
            )));
        }

        let tier = AccountRepository::new(&self.pool).plan_of(owner_id).await?;
        let existing = artifacts.count_by_owner(owner_id).await?;
        self.policy.check_create(existing as u32, tier)?;

        let main_size = tokio::fs::metadata(&main_blob.path).await?.len();
        let size_mb = size_in_mb(main_size);
        self.policy.check_size(size_mb, tier)?;

        // All checks passed; first filesystem mutation happens now.
        let dest_dir = self.placement.new_artifact_dir(owner_id, &fields.name);
        tokio::fs::create_dir_all(&dest_dir).await?;

        let main_path = place_blob(&dest_dir, "main", &main_blob).await?;
        let icon_path = place_blob(&dest_dir, "icon", &icon_blob).await?;

        let artifact = artifacts
            .create(&NewArtifact {
                owner_id,
                name: fields.name.clone(),
                category: fields.category.clone(),
                description: fields.description.clone(),
                size_mb: size_mb as i64,
                url: self.placement.url_for(&main_path)?,
                icon_url: self.placement.url_for(&icon_path)?,
            })
            .await?;

        let media = MediaRepository::new(&self.pool);
        for blob in media_blobs.into_iter().take(MAX_MEDIA_ASSETS) {
            let path = place_blob(&dest_dir, "media", &blob).await?;
            media.insert(artifact.id, &self.placement.url_for(&path)?).await?;
        }

        info!(
            artifact_id = artifact.id,
            owner_id,
            name = %fields.name,
            size_mb,
            "Created artifact"
        );
        Ok(artifact.id)
    }

    /// Update an artifact.
    ///
    /// Steps run in a fixed order — description, deleted media, main blob,
    /// icon, new media — and each is independently optional. The
    /// description update, being the only validated step, runs before any
    /// filesystem mutation so a validation failure cannot leave files
    /// half-replaced. The destination directory is resolved once from the
    /// stored main URL and threaded through the blob steps.
    pub async fn update(&self, artifact_id: i64, patch: ArtifactPatch) -> Result<()> {
        let guard = self.locks.acquire(artifact_id).await;

        let artifacts = ArtifactRepository::new(&self.pool);
        let Some(artifact) = artifacts.get_by_id(artifact_id).await? else {
            drop(guard);
            self.locks.forget(&artifact_id).await;
            return Err(DepotError::NotFound("artifact".to_string()));
        };

        if let Some(description) = &patch.description {
            if description.trim().is_empty() {
                return Err(DepotError::Validation(
                    "description must not be empty".to_string(),
                ));
            }
            artifacts.update_description(artifact_id, description).await?;
        }

        let media = MediaRepository::new(&self.pool);
        for url in &patch.remove_media {
            // Best-effort file delete; the row goes away regardless.
            match self.placement.resolve_file(url) {
                Ok(path) => delete_file_best_effort(&path).await,
                Err(e) => warn!(url, error = %e, "Could not resolve media URL for deletion"),
            }
            media.delete_by_url(url).await?;
        }

        let needs_dir = patch.new_main.is_some()
            || patch.new_icon.is_some()
            || !patch.new_media.is_empty();
        if !needs_dir {
            return Ok(());
        }

        // In-place update: reuse the original directory so sibling files
        // not being replaced stay where their URLs point.
        let dest_dir = self.placement.resolve_dir(&artifact.url)?;

        if let Some(blob) = &patch.new_main {
            match self.placement.resolve_file(&artifact.url) {
                Ok(old) => delete_file_best_effort(&old).await,
                Err(e) => warn!(url = %artifact.url, error = %e, "Could not resolve old main blob"),
            }

            let new_path = place_blob(&dest_dir, "main", blob).await?;
            let size = tokio::fs::metadata(&new_path).await?.len();
            artifacts
                .update_main(
                    artifact_id,
                    size_in_mb(size) as i64,
                    &self.placement.url_for(&new_path)?,
                )
                .await?;
        }

        if let Some(blob) = &patch.new_icon {
            match self.placement.resolve_file(&artifact.icon_url) {
                Ok(old) => delete_file_best_effort(&old).await,
                Err(e) => warn!(url = %artifact.icon_url, error = %e, "Could not resolve old icon"),
            }

            let new_path = place_blob(&dest_dir, "icon", blob).await?;
            artifacts
                .update_icon_url(artifact_id, &self.placement.url_for(&new_path)?)
                .await?;
        }

        if !patch.new_media.is_empty() {
            // Ceiling measured against the current count, after removals
            let current = media.count(artifact_id).await? as usize;
            let remaining = MAX_MEDIA_ASSETS.saturating_sub(current);
            for blob in patch.new_media.iter().take(remaining) {
                let path = place_blob(&dest_dir, "media", blob).await?;
                media
                    .insert(artifact_id, &self.placement.url_for(&path)?)
                    .await?;
            }
        }

        info!(artifact_id, "Updated artifact");
        Ok(())
    }

    /// Remove an artifact, its dependent rows, and its blobs.
    ///
    /// Blob and directory cleanup is best-effort and not transactionally
    /// tied to the metadata deletion; a dangling record with no backing
    /// files is an accepted failure mode requiring external reconciliation.
    pub async fn remove(&self, artifact_id: i64) -> Result<()> {
        let guard = self.locks.acquire(artifact_id).await;

        let artifacts = ArtifactRepository::new(&self.pool);
        let Some(artifact) = artifacts.get_by_id(artifact_id).await? else {
            drop(guard);
            self.locks.forget(&artifact_id).await;
            return Err(DepotError::NotFound("artifact".to_string()));
        };

        // One read gathers every referenced blob URL
        let media = MediaRepository::new(&self.pool);
        let mut urls = vec![artifact.url.clone(), artifact.icon_url.clone()];
        urls.extend(media.list_urls(artifact_id).await?);

        let mut parent_dirs: HashSet<PathBuf> = HashSet::new();
        for url in &urls {
            match self.placement.resolve_file(url) {
                Ok(path) => {
                    delete_file_best_effort(&path).await;
                    if let Some(parent) = path.parent() {
                        parent_dirs.insert(parent.to_path_buf());
                    }
                }
                Err(e) => warn!(url, error = %e, "Could not resolve blob URL for deletion"),
            }
        }

        // Directories are shared between an artifact's blobs, and reuse on
        // update can leave unrelated content beside them: delete only if
        // empty, never recursively.
        for dir in parent_dirs {
            remove_dir_if_empty(&dir).await;
        }

        artifacts.delete_cascade(artifact_id).await?;

        info!(artifact_id, name = %artifact.name, "Removed artifact");

        // The artifact is gone; its lock entry goes with it
        drop(guard);
        self.locks.forget(&artifact_id).await;
        Ok(())
    }

    /// Get an artifact's detail: record, media URLs and reviews.
    pub async fn get(&self, artifact_id: i64) -> Result<ArtifactDetail> {
        let artifact = ArtifactRepository::new(&self.pool)
            .get_by_id(artifact_id)
            .await?
            .ok_or_else(|| DepotError::NotFound("artifact".to_string()))?;

        let media = MediaRepository::new(&self.pool).list_urls(artifact_id).await?;
        let reviews = ReviewRepository::new(&self.pool)
            .list_by_artifact(artifact_id)
            .await?;

        Ok(ArtifactDetail {
            artifact,
            media,
            reviews,
        })
    }

    /// List the whole catalogue, newest first.
    pub async fn list(&self) -> Result<Vec<Artifact>> {
        ArtifactRepository::new(&self.pool).list().await
    }

    /// List one owner's artifacts, newest first.
    pub async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Artifact>> {
        ArtifactRepository::new(&self.pool).list_by_owner(owner_id).await
    }

    /// Count a download against an artifact.
    pub async fn record_download(&self, artifact_id: i64) -> Result<()> {
        let counted = ArtifactRepository::new(&self.pool)
            .increment_downloads(artifact_id)
            .await?;
        if !counted {
            return Err(DepotError::NotFound("artifact".to_string()));
        }
        Ok(())
    }

    /// Compare one owner's metadata against the filesystem.
    ///
    /// Read-only: reports stored URLs with no backing file and storage
    /// directories no record references. Repairing either side is left to
    /// the operator.
    pub async fn reconcile(&self, owner_id: i64) -> Result<ReconcileReport> {
        let artifacts = ArtifactRepository::new(&self.pool)
            .list_by_owner(owner_id)
            .await?;
        let media = MediaRepository::new(&self.pool);

        let mut report = ReconcileReport::default();
        let mut referenced_dirs: HashSet<PathBuf> = HashSet::new();

        for artifact in &artifacts {
            let mut urls = vec![artifact.url.clone(), artifact.icon_url.clone()];
            urls.extend(media.list_urls(artifact.id).await?);

            for url in urls {
                match self.placement.resolve_file(&url) {
                    Ok(path) => {
                        if let Some(parent) = path.parent() {
                            referenced_dirs.insert(parent.to_path_buf());
                        }
                        if !path.exists() {
                            report.missing_files.push(url);
                        }
                    }
                    Err(_) => report.missing_files.push(url),
                }
            }
        }

        let owner_root = self.placement.uploads_root().join(owner_id.to_string());
        if let Ok(mut entries) = tokio::fs::read_dir(&owner_root).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if path.is_dir() && !referenced_dirs.contains(&path) {
                    report.orphan_dirs.push(path);
                }
            }
        }

        Ok(report)
    }
}

/// Whole megabytes, rounded up.
fn size_in_mb(bytes: u64) -> u64 {
    bytes.div_ceil(BYTES_PER_MB)
}

/// Move a staged blob into `dest_dir` under a fresh stored name.
///
/// This is the one filesystem write that stays fatal on failure.
async fn place_blob(dest_dir: &Path, prefix: &str, blob: &BlobSource) -> Result<PathBuf> {
    let stored_name = StoragePlacement::stored_file_name(prefix, &blob.original_name);
    let dest = dest_dir.join(stored_name);

    match tokio::fs::rename(&blob.path, &dest).await {
        Ok(()) => {}
        // Staging may sit on another filesystem; fall back to copy+remove
        Err(_) => {
            tokio::fs::copy(&blob.path, &dest).await?;
            if let Err(e) = tokio::fs::remove_file(&blob.path).await {
                warn!(path = %blob.path.display(), error = %e, "Failed to remove staged source");
            }
        }
    }
    Ok(dest)
}

/// Delete a blob file, logging rather than failing.
async fn delete_file_best_effort(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to delete blob file");
        }
    }
}

/// Delete a directory only if it is now empty.
async fn remove_dir_if_empty(dir: &Path) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return,
    };
    match entries.next_entry().await {
        Ok(None) => {
            if let Err(e) = tokio::fs::remove_dir(dir).await {
                warn!(dir = %dir.display(), error = %e, "Failed to remove empty directory");
            }
        }
        // Non-empty or unreadable: leave it alone
        _ => {}
    }
}
