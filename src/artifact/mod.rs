//! Artifact catalogue and lifecycle for depot.
//!
//! An artifact is a published application package: one metadata row, a main
//! blob, an icon, and up to four preview media files, all sharing one
//! storage directory. The [`ArtifactService`] orchestrates create, update
//! and remove across the metadata store and the filesystem.

mod media;
mod record;
mod review;
mod service;

pub use media::{MediaAsset, MediaRepository};
pub use record::{Artifact, ArtifactRepository, NewArtifact};
pub use review::{NewReview, Review, ReviewRepository};
pub use service::{
    ArtifactDetail, ArtifactPatch, ArtifactService, BlobSource, NewArtifactRequest,
    ReconcileReport,
};

/// Maximum number of preview media assets per artifact.
///
/// Enforced across add and remove operations, not just at creation.
pub const MAX_MEDIA_ASSETS: usize = 4;
