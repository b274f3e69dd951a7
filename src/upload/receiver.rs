//! Chunk receiver: persists individual upload chunks to staging.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::config::SessionsConfig;
use crate::{DepotError, Result};

use super::session::SessionStore;
use super::{chunk_file_name, validate_token};

/// Persists individual chunks of in-progress uploads.
///
/// Chunks for distinct sessions land in distinct staging directories and
/// never interfere. Retransmission of the same index overwrites
/// (last-write-wins); this is safe because retries carry identical content.
pub struct ChunkReceiver {
    staging_root: PathBuf,
    sessions: Arc<SessionStore>,
    max_sessions_per_account: usize,
    max_staging_bytes_per_account: u64,
}

impl ChunkReceiver {
    /// Create a new ChunkReceiver writing under `staging_root`.
    pub fn new(
        staging_root: impl Into<PathBuf>,
        sessions: Arc<SessionStore>,
        config: &SessionsConfig,
    ) -> Self {
        Self {
            staging_root: staging_root.into(),
            sessions,
            max_sessions_per_account: config.max_per_account,
            max_staging_bytes_per_account: config.max_staging_bytes_per_account,
        }
    }

    /// Persist one chunk of an upload session.
    ///
    /// Creates the staging directory on first write. No ordering constraint
    /// on arrival; a duplicate index overwrites the prior content.
    pub async fn receive_chunk(
        &self,
        session_id: &str,
        owner_id: i64,
        index: u32,
        bytes: &[u8],
    ) -> Result<()> {
        validate_token(session_id, "session id")?;
        if bytes.is_empty() {
            return Err(DepotError::Validation("chunk payload is required".to_string()));
        }

        self.check_account_caps(session_id, owner_id, index, bytes.len() as u64)
            .await?;

        let staging_dir = self.staging_root.join(session_id);
        tokio::fs::create_dir_all(&staging_dir).await?;

        let chunk_path = staging_dir.join(chunk_file_name(index));
        tokio::fs::write(&chunk_path, bytes).await?;

        self.sessions
            .record_chunk(session_id, owner_id, staging_dir, index, bytes.len() as u64)
            .await;

        debug!(
            session_id,
            index,
            len = bytes.len(),
            "Staged upload chunk"
        );
        Ok(())
    }

    /// Enforce per-account session count and staging byte ceilings.
    ///
    /// Bounds resource growth from abandoned uploads; an overwrite of an
    /// existing index only counts its size delta.
    async fn check_account_caps(
        &self,
        session_id: &str,
        owner_id: i64,
        index: u32,
        len: u64,
    ) -> Result<()> {
        match self.sessions.get(session_id).await {
            // A session id is bound to the account that opened it
            Some(session) if session.owner_id != owner_id => {
                return Err(DepotError::Validation(format!(
                    "upload session {session_id} belongs to another account"
                )));
            }
            Some(_) => {}
            None => {
                if self.sessions.open_count_for(owner_id).await >= self.max_sessions_per_account {
                    return Err(DepotError::QuotaExceeded(format!(
                        "at most {} concurrent upload sessions per account",
                        self.max_sessions_per_account
                    )));
                }
            }
        }

        let current = self.sessions.staged_bytes_for(owner_id).await;
        let replaced = self
            .sessions
            .chunk_len(session_id, index)
            .await
            .unwrap_or(0);
        if current.saturating_sub(replaced) + len > self.max_staging_bytes_per_account {
            return Err(DepotError::QuotaExceeded(format!(
                "staging space per account is capped at {} bytes",
                self.max_staging_bytes_per_account
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ChunkReceiver, Arc<SessionStore>) {
        let temp = TempDir::new().unwrap();
        let sessions = Arc::new(SessionStore::new());
        let receiver = ChunkReceiver::new(
            temp.path().join("temp"),
            Arc::clone(&sessions),
            &SessionsConfig::default(),
        );
        (temp, receiver, sessions)
    }

    #[tokio::test]
    async fn test_receive_writes_chunk_file() {
        let (temp, receiver, _sessions) = setup();

        receiver.receive_chunk("s1", 1, 0, b"hello").await.unwrap();

        let chunk = temp.path().join("temp/s1/chunk-0");
        assert_eq!(tokio::fs::read(&chunk).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_any_arrival_order() {
        let (temp, receiver, sessions) = setup();

        receiver.receive_chunk("s1", 1, 2, b"cc").await.unwrap();
        receiver.receive_chunk("s1", 1, 0, b"aa").await.unwrap();
        receiver.receive_chunk("s1", 1, 1, b"bb").await.unwrap();

        for i in 0..3 {
            assert!(temp.path().join(format!("temp/s1/chunk-{i}")).exists());
        }
        assert!(sessions.get("s1").await.unwrap().is_ready(3));
    }

    #[tokio::test]
    async fn test_duplicate_index_overwrites() {
        let (temp, receiver, sessions) = setup();

        receiver.receive_chunk("s1", 1, 0, b"first").await.unwrap();
        receiver.receive_chunk("s1", 1, 0, b"second!").await.unwrap();

        let chunk = temp.path().join("temp/s1/chunk-0");
        assert_eq!(tokio::fs::read(&chunk).await.unwrap(), b"second!");
        assert_eq!(sessions.get("s1").await.unwrap().staged_bytes(), 7);
    }

    #[tokio::test]
    async fn test_distinct_sessions_are_independent() {
        let (temp, receiver, _sessions) = setup();

        receiver.receive_chunk("aaa", 1, 0, b"a").await.unwrap();
        receiver.receive_chunk("bbb", 2, 0, b"b").await.unwrap();

        assert_eq!(
            tokio::fs::read(temp.path().join("temp/aaa/chunk-0"))
                .await
                .unwrap(),
            b"a"
        );
        assert_eq!(
            tokio::fs::read(temp.path().join("temp/bbb/chunk-0"))
                .await
                .unwrap(),
            b"b"
        );
    }

    #[tokio::test]
    async fn test_missing_parameters_rejected() {
        let (_temp, receiver, _sessions) = setup();

        let result = receiver.receive_chunk("", 1, 0, b"data").await;
        assert!(matches!(result, Err(DepotError::Validation(_))));

        let result = receiver.receive_chunk("s1", 1, 0, b"").await;
        assert!(matches!(result, Err(DepotError::Validation(_))));
    }

    #[tokio::test]
    async fn test_session_owner_mismatch_rejected() {
        let (_temp, receiver, sessions) = setup();

        receiver.receive_chunk("s1", 1, 0, &[0u8; 8]).await.unwrap();

        // Another account naming the same session id is turned away
        let result = receiver.receive_chunk("s1", 2, 0, b"x").await;
        assert!(matches!(result, Err(DepotError::Validation(_))));
        assert_eq!(sessions.get("s1").await.unwrap().owner_id, 1);

        // The rightful owner continues unaffected
        receiver.receive_chunk("s1", 1, 1, b"more").await.unwrap();
    }

    #[tokio::test]
    async fn test_traversal_session_id_rejected() {
        let (_temp, receiver, _sessions) = setup();

        let result = receiver.receive_chunk("../../etc", 1, 0, b"data").await;
        assert!(matches!(result, Err(DepotError::Validation(_))));
    }

    #[tokio::test]
    async fn test_session_count_cap() {
        let temp = TempDir::new().unwrap();
        let sessions = Arc::new(SessionStore::new());
        let config = SessionsConfig {
            max_per_account: 1,
            ..SessionsConfig::default()
        };
        let receiver =
            ChunkReceiver::new(temp.path().join("temp"), Arc::clone(&sessions), &config);

        receiver.receive_chunk("s1", 1, 0, b"x").await.unwrap();
        // Same session: more chunks are fine
        receiver.receive_chunk("s1", 1, 1, b"y").await.unwrap();
        // Second session for the same account: rejected
        let result = receiver.receive_chunk("s2", 1, 0, b"z").await;
        assert!(matches!(result, Err(DepotError::QuotaExceeded(_))));
        // Other accounts are unaffected
        receiver.receive_chunk("s3", 2, 0, b"w").await.unwrap();
    }

    #[tokio::test]
    async fn test_staging_bytes_cap() {
        let temp = TempDir::new().unwrap();
        let sessions = Arc::new(SessionStore::new());
        let config = SessionsConfig {
            max_staging_bytes_per_account: 10,
            ..SessionsConfig::default()
        };
        let receiver =
            ChunkReceiver::new(temp.path().join("temp"), Arc::clone(&sessions), &config);

        receiver.receive_chunk("s1", 1, 0, b"12345678").await.unwrap();
        let result = receiver.receive_chunk("s1", 1, 1, b"too much").await;
        assert!(matches!(result, Err(DepotError::QuotaExceeded(_))));

        // Overwriting an index counts only the delta
        receiver.receive_chunk("s1", 1, 0, b"1234567890").await.unwrap();
    }
}
