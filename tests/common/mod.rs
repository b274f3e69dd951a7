//! Test helpers for depot integration tests.
//!
//! Provides a TestDepot fixture wiring the whole pipeline — chunk receiver,
//! assembler, placement, policy and the artifact service — over a temporary
//! uploads root and an in-memory database.

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use depot::config::{PlansConfig, SessionsConfig};
use depot::db::NewAccount;
use depot::{
    AccountRepository, ArtifactService, Assembler, BlobSource, ChunkReceiver, Database,
    NewArtifactRequest, PlanPolicy, PlanTier, SessionStore, StoragePlacement,
};

/// A fully wired depot over temporary storage.
pub struct TestDepot {
    // Dropped last; owns the uploads root.
    _temp: TempDir,
    pub db: Database,
    pub sessions: Arc<SessionStore>,
    pub receiver: ChunkReceiver,
    pub assembler: Assembler,
    pub service: ArtifactService,
    pub staging: PathBuf,
}

impl TestDepot {
    /// Build a depot with the default plan ceilings.
    pub async fn new() -> Self {
        Self::with_config(PlansConfig::default(), SessionsConfig::default()).await
    }

    /// Build a depot with custom plan and session configuration.
    pub async fn with_config(plans: PlansConfig, sessions_config: SessionsConfig) -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let uploads = temp.path().join("uploads");
        let staging = temp.path().join("client-staging");
        tokio::fs::create_dir_all(&staging)
            .await
            .expect("Failed to create staging dir");

        let db = Database::open_in_memory()
            .await
            .expect("Failed to create test database");

        let placement = StoragePlacement::new(&uploads, "http://localhost:3000/uploads");
        let sessions = Arc::new(SessionStore::new());
        let receiver = ChunkReceiver::new(placement.staging_root(), sessions.clone(), &sessions_config);
        let assembler = Assembler::new(placement.staging_root(), sessions.clone());
        let service = ArtifactService::new(
            db.pool().clone(),
            placement,
            PlanPolicy::from_config(&plans),
        );

        Self {
            _temp: temp,
            db,
            sessions,
            receiver,
            assembler,
            service,
            staging,
        }
    }

    /// Create an account on the given tier and return its id.
    pub async fn create_account(&self, username: &str, tier: PlanTier) -> i64 {
        AccountRepository::new(self.db.pool())
            .create(&NewAccount::new(username).with_plan(tier))
            .await
            .expect("Failed to create account")
            .id
    }

    /// Write a file into client-side staging and describe it as a blob.
    pub async fn stage_blob(&self, original_name: &str, bytes: &[u8]) -> BlobSource {
        let path = self
            .staging
            .join(format!("{}-{original_name}", uuid_suffix()));
        tokio::fs::write(&path, bytes)
            .await
            .expect("Failed to write staged blob");
        BlobSource::new(path, original_name)
    }

    /// Upload `bytes` in fixed-size chunks and assemble the result.
    pub async fn upload_chunked(
        &self,
        session_id: &str,
        owner_id: i64,
        bytes: &[u8],
        chunk_size: usize,
        extension: &str,
    ) -> depot::upload::FinalBlob {
        let chunks: Vec<&[u8]> = bytes.chunks(chunk_size).collect();
        for (index, chunk) in chunks.iter().enumerate() {
            self.receiver
                .receive_chunk(session_id, owner_id, index as u32, chunk)
                .await
                .expect("Failed to receive chunk");
        }
        self.assembler
            .assemble(session_id, chunks.len() as u32, extension)
            .await
            .expect("Failed to assemble upload")
    }

    /// Publish an artifact from plain staged blobs (no chunking).
    pub async fn publish(&self, owner_id: i64, name: &str) -> i64 {
        let main = self.stage_blob("release.apk", b"main blob bytes").await;
        let icon = self.stage_blob("icon.png", b"icon bytes").await;
        self.service
            .create(owner_id, &request(name), main, icon, vec![])
            .await
            .expect("Failed to publish artifact")
    }
}

/// Standard artifact fields for tests.
pub fn request(name: &str) -> NewArtifactRequest {
    NewArtifactRequest {
        name: name.to_string(),
        category: "utilities".to_string(),
        description: "A test artifact".to_string(),
    }
}

fn uuid_suffix() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(0);
    format!("blob{}", NEXT.fetch_add(1, Ordering::Relaxed))
}
