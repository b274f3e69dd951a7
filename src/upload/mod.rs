//! Chunked upload ingestion for depot.
//!
//! Large artifact blobs arrive as independently transmitted chunks keyed by
//! an opaque session token. The [`ChunkReceiver`] persists chunks into a
//! per-session staging directory, and the [`Assembler`] concatenates them in
//! index order into a single sequential blob once the client signals
//! completion.

mod assembler;
mod receiver;
mod session;

pub use assembler::Assembler;
pub use receiver::ChunkReceiver;
pub use session::{SessionState, SessionStore, UploadSession};

use std::path::PathBuf;

use crate::{DepotError, Result};

/// Prefix of per-index chunk files inside a staging directory.
pub const CHUNK_FILE_PREFIX: &str = "chunk-";

/// A fully assembled artifact blob, ready for placement.
#[derive(Debug, Clone)]
pub struct FinalBlob {
    /// Path of the assembled file under the staging root.
    pub path: PathBuf,
    /// Final size measured from filesystem metadata.
    pub size_bytes: u64,
}

/// File name of the chunk at `index`.
pub(crate) fn chunk_file_name(index: u32) -> String {
    format!("{CHUNK_FILE_PREFIX}{index}")
}

/// Validate an opaque token used as a path component (session id).
///
/// Tokens come from the request layer; restricting them to `[A-Za-z0-9_-]`
/// keeps them from escaping the staging root.
pub(crate) fn validate_token(token: &str, what: &str) -> Result<()> {
    if token.is_empty() {
        return Err(DepotError::Validation(format!("{what} is required")));
    }
    if !token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(DepotError::Validation(format!(
            "{what} contains invalid characters"
        )));
    }
    Ok(())
}

/// Validate a file extension used to name the assembled blob.
///
/// Compound extensions such as `tar.gz` are allowed; empty dot-separated
/// segments (leading or trailing dots, `..`) are not, so an extension can
/// never escape the staging root.
pub(crate) fn validate_extension(ext: &str) -> Result<()> {
    if ext.is_empty() {
        return Err(DepotError::Validation(
            "file extension is required".to_string(),
        ));
    }
    let segments_ok = ext.split('.').all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    });
    if !segments_ok {
        return Err(DepotError::Validation(
            "file extension contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
