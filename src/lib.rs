//! Depot - application package publishing storage
//!
//! Chunked upload ingestion, artifact blob placement, and the metadata
//! lifecycle (create, update, remove) for a package publishing service.

pub mod artifact;
pub mod config;
pub mod db;
pub mod error;
pub mod locks;
pub mod logging;
pub mod placement;
pub mod policy;
pub mod upload;

pub use artifact::{
    Artifact, ArtifactDetail, ArtifactPatch, ArtifactRepository, ArtifactService, BlobSource,
    MediaAsset, MediaRepository, NewArtifact, NewArtifactRequest, NewReview, ReconcileReport,
    Review, ReviewRepository, MAX_MEDIA_ASSETS,
};
pub use config::Config;
pub use db::{Account, AccountRepository, Database, NewAccount};
pub use error::{DepotError, Result};
pub use locks::LockMap;
pub use placement::StoragePlacement;
pub use policy::{PlanPolicy, PlanTier, TierLimits};
pub use upload::{
    Assembler, ChunkReceiver, FinalBlob, SessionState, SessionStore, UploadSession,
};
