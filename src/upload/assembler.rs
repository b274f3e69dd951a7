//! Assembler: concatenates staged chunks into one sequential blob.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::{DepotError, Result};

use super::session::{SessionState, SessionStore};
use super::{chunk_file_name, validate_extension, validate_token, FinalBlob};

/// Concatenates the chunks of a completed session, in index order, into a
/// single artifact blob.
///
/// Assembly is mutually exclusive per session id: the per-session lock is
/// acquired before index 0 is read and held until the staging directory is
/// removed. Failure mid-loop is non-atomic and non-resumable by design —
/// already-consumed chunks stay deleted and the partial output remains
/// unreferenced; the caller discards the session and restarts.
pub struct Assembler {
    staging_root: PathBuf,
    sessions: Arc<SessionStore>,
}

impl Assembler {
    /// Create a new Assembler over `staging_root`.
    pub fn new(staging_root: impl Into<PathBuf>, sessions: Arc<SessionStore>) -> Self {
        Self {
            staging_root: staging_root.into(),
            sessions,
        }
    }

    /// Assemble all chunks of `session_id` into `<session_id>-final.<ext>`.
    ///
    /// Every index in `[0, expected_count)` must have a staged chunk file;
    /// the first absent index aborts with `MissingChunk`. Chunks are deleted
    /// immediately after being consumed, freeing staging space
    /// incrementally. On success the staging directory is removed and the
    /// session entry is dropped.
    pub async fn assemble(
        &self,
        session_id: &str,
        expected_count: u32,
        extension: &str,
    ) -> Result<FinalBlob> {
        validate_token(session_id, "session id")?;
        validate_extension(extension)?;
        if expected_count == 0 {
            return Err(DepotError::Validation(
                "expected chunk count must be at least 1".to_string(),
            ));
        }

        // Exclusive per-session scope: held until the staging dir is gone.
        let guard = self.sessions.lock(session_id).await;

        let staging_dir = self.staging_root.join(session_id);
        if !staging_dir.is_dir() {
            return Err(DepotError::NotFound("upload session".to_string()));
        }

        self.sessions
            .set_state(session_id, SessionState::Assembling)
            .await;

        let output_path = self
            .staging_root
            .join(format!("{session_id}-final.{extension}"));
        let mut output = File::create(&output_path).await?;

        for index in 0..expected_count {
            let chunk_path = staging_dir.join(chunk_file_name(index));

            let bytes = match tokio::fs::read(&chunk_path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    self.sessions
                        .set_state(session_id, SessionState::Failed)
                        .await;
                    warn!(session_id, index, "Assembly aborted: chunk never received");
                    return Err(DepotError::MissingChunk(index));
                }
                Err(e) => return Err(e.into()),
            };

            output.write_all(&bytes).await?;

            // Free staging space incrementally rather than only at the end
            if let Err(e) = tokio::fs::remove_file(&chunk_path).await {
                warn!(session_id, index, error = %e, "Failed to delete consumed chunk");
            }
            debug!(session_id, index, len = bytes.len(), "Consumed chunk");
        }

        output.flush().await?;
        output.sync_all().await?;
        drop(output);

        // Re-read filesystem metadata rather than trusting summed chunk
        // lengths, guarding against partial writes.
        let size_bytes = tokio::fs::metadata(&output_path).await?.len();

        tokio::fs::remove_dir_all(&staging_dir).await?;
        self.sessions
            .set_state(session_id, SessionState::Completed)
            .await;
        self.sessions.remove(session_id).await;

        info!(session_id, size_bytes, "Assembled upload session");

        // The lock entry can only be dropped once the guard is released
        drop(guard);
        self.sessions.forget_lock(session_id).await;

        Ok(FinalBlob {
            path: output_path,
            size_bytes,
        })
    }
}
