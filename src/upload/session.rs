//! Upload session bookkeeping.
//!
//! Tracks in-progress chunked uploads: which indices have arrived, how much
//! staging space each session consumes, and the per-session exclusive scope
//! required during assembly. The staging files themselves live under
//! `uploads/temp/<session_id>/`; the store is the in-memory view of them.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::locks::LockMap;

/// Lifecycle state of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session entry allocated, no chunk recorded yet.
    Created,
    /// At least one chunk received; arrival order is unconstrained.
    Receiving,
    /// Every expected index has been received.
    Ready,
    /// Assembly in progress under the session's exclusive lock.
    Assembling,
    /// Blob materialized; the session has been destroyed.
    Completed,
    /// Assembly found a missing chunk; the session is abandoned.
    Failed,
}

/// In-memory state of one chunked upload.
#[derive(Debug, Clone)]
pub struct UploadSession {
    /// Opaque session token.
    pub id: String,
    /// Owning account.
    pub owner_id: i64,
    /// Staging directory holding the chunk files.
    pub staging_dir: PathBuf,
    /// Current lifecycle state.
    pub state: SessionState,
    /// When the session was created (first chunk write).
    pub created_at: DateTime<Utc>,
    /// Byte length of each received chunk, keyed by index.
    chunk_sizes: HashMap<u32, u64>,
}

impl UploadSession {
    fn new(id: String, owner_id: i64, staging_dir: PathBuf) -> Self {
        Self {
            id,
            owner_id,
            staging_dir,
            state: SessionState::Created,
            created_at: Utc::now(),
            chunk_sizes: HashMap::new(),
        }
    }

    /// Received chunk indices in ascending order.
    pub fn received_indices(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self.chunk_sizes.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Total staging bytes currently held by this session.
    ///
    /// Duplicate transmissions overwrite, so each index counts once.
    pub fn staged_bytes(&self) -> u64 {
        self.chunk_sizes.values().sum()
    }

    /// Whether every index in `[0, expected_count)` has been received.
    pub fn is_ready(&self, expected_count: u32) -> bool {
        (0..expected_count).all(|i| self.chunk_sizes.contains_key(&i))
    }
}

/// Shared registry of open upload sessions.
///
/// One instance is shared between the [`ChunkReceiver`] and the
/// [`Assembler`] so that per-session locks and bookkeeping agree.
///
/// [`ChunkReceiver`]: super::ChunkReceiver
/// [`Assembler`]: super::Assembler
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, UploadSession>>,
    locks: LockMap<String>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a received chunk, creating the session entry if absent.
    ///
    /// Re-sent indices overwrite: the previous size for that index is
    /// replaced, not added.
    pub async fn record_chunk(
        &self,
        session_id: &str,
        owner_id: i64,
        staging_dir: PathBuf,
        index: u32,
        len: u64,
    ) {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| UploadSession::new(session_id.to_string(), owner_id, staging_dir));
        session.chunk_sizes.insert(index, len);
        session.state = SessionState::Receiving;
    }

    /// Get a snapshot of a session.
    pub async fn get(&self, session_id: &str) -> Option<UploadSession> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    /// Number of open sessions owned by `owner_id`.
    pub async fn open_count_for(&self, owner_id: i64) -> usize {
        self.sessions
            .lock()
            .await
            .values()
            .filter(|s| s.owner_id == owner_id)
            .count()
    }

    /// Total staging bytes held by `owner_id` across open sessions.
    pub async fn staged_bytes_for(&self, owner_id: i64) -> u64 {
        self.sessions
            .lock()
            .await
            .values()
            .filter(|s| s.owner_id == owner_id)
            .map(UploadSession::staged_bytes)
            .sum()
    }

    /// Bytes currently recorded for one chunk index, if any.
    pub async fn chunk_len(&self, session_id: &str, index: u32) -> Option<u64> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .and_then(|s| s.chunk_sizes.get(&index).copied())
    }

    /// Set the lifecycle state of a session, if it exists.
    pub async fn set_state(&self, session_id: &str, state: SessionState) {
        if let Some(session) = self.sessions.lock().await.get_mut(session_id) {
            session.state = state;
        }
    }

    /// Remove a session entry, returning it.
    pub async fn remove(&self, session_id: &str) -> Option<UploadSession> {
        self.sessions.lock().await.remove(session_id)
    }

    /// Acquire the exclusive per-session scope.
    ///
    /// Assembly holds this from before reading index 0 until the staging
    /// directory is removed.
    pub async fn lock(&self, session_id: &str) -> OwnedMutexGuard<()> {
        self.locks.acquire(session_id.to_string()).await
    }

    /// Drop the lock entry of a retired session.
    ///
    /// Only takes effect once the assembly guard has been released; a held
    /// entry is left alone.
    pub async fn forget_lock(&self, session_id: &str) {
        self.locks.forget(&session_id.to_string()).await;
    }

    /// Whether a lock entry exists for `session_id`.
    pub async fn has_lock(&self, session_id: &str) -> bool {
        self.locks.contains(&session_id.to_string()).await
    }

    /// Remove sessions idle longer than `ttl_secs` and delete their staging
    /// directories. Sessions mid-assembly are skipped.
    ///
    /// Returns the number of sessions reaped.
    pub async fn reap_expired(&self, ttl_secs: u64) -> usize {
        let now = Utc::now();
        let expired: Vec<UploadSession> = {
            let mut sessions = self.sessions.lock().await;
            let ids: Vec<String> = sessions
                .values()
                .filter(|s| {
                    s.state != SessionState::Assembling
                        && (now - s.created_at).num_seconds() >= ttl_secs as i64
                })
                .map(|s| s.id.clone())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        let mut reaped = 0;
        for session in expired {
            debug!(session_id = %session.id, "Reaping expired upload session");
            if let Err(e) = tokio::fs::remove_dir_all(&session.staging_dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        session_id = %session.id,
                        error = %e,
                        "Failed to remove staging directory of expired session"
                    );
                }
            }
            self.locks.forget(&session.id).await;
            reaped += 1;
        }
        reaped
    }
}
