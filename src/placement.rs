//! Storage placement for depot.
//!
//! Computes storage directories for new artifacts, maps stored public URLs
//! back to filesystem paths, and nothing else: this module never mutates the
//! filesystem.
//!
//! Layout:
//! ```text
//! {uploads_root}/
//! ├── temp/<session_id>/chunk-<index>     staging area
//! ├── temp/<session_id>-final.<ext>       assembly output
//! └── <owner_id>/<sanitized>-<key>/       one directory per artifact,
//!                                         shared by main blob, icon, media
//! ```

use std::path::{Component, Path, PathBuf};

use url::Url;
use uuid::Uuid;

use crate::{DepotError, Result};

/// Computes and reverses storage paths under a fixed uploads root.
#[derive(Debug, Clone)]
pub struct StoragePlacement {
    /// Root directory for all artifact and staging storage.
    uploads_root: PathBuf,
    /// Public base URL mapped onto `uploads_root`, no trailing slash.
    base_url: String,
}

impl StoragePlacement {
    /// Create a new StoragePlacement.
    pub fn new(uploads_root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            uploads_root: uploads_root.into(),
            base_url,
        }
    }

    /// Get the uploads root.
    pub fn uploads_root(&self) -> &Path {
        &self.uploads_root
    }

    /// Get the staging root for in-progress upload sessions.
    pub fn staging_root(&self) -> PathBuf {
        self.uploads_root.join("temp")
    }

    /// Compute a fresh storage directory for a new artifact.
    ///
    /// The folder name is seeded from a generated identifier allocated
    /// before any file write, so uniqueness does not depend on wall-clock
    /// granularity.
    pub fn new_artifact_dir(&self, owner_id: i64, logical_name: &str) -> PathBuf {
        let key = Uuid::new_v4().simple().to_string();
        let folder = format!("{}-{}", Self::sanitize_name(logical_name), key);
        self.uploads_root.join(owner_id.to_string()).join(folder)
    }

    /// Sanitize a logical name for use in a folder name.
    ///
    /// Every character outside `[a-z0-9]` (case-insensitive) becomes `_`;
    /// letters are lowercased.
    pub fn sanitize_name(name: &str) -> String {
        name.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Generate a stored file name `<prefix>-<key>.<ext>`.
    ///
    /// The extension comes from the original filename, defaulting to "bin".
    pub fn stored_file_name(prefix: &str, original_name: &str) -> String {
        let key = Uuid::new_v4().simple().to_string();
        let ext = Self::extract_extension(original_name);
        format!("{prefix}-{key}.{ext}")
    }

    /// Extract the file extension from a filename.
    ///
    /// Returns "bin" if no extension is found.
    pub fn extract_extension(filename: &str) -> &str {
        Path::new(filename)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("bin")
    }

    /// Derive the public URL for a file under the uploads root.
    ///
    /// Path separators are normalized to `/` and each segment is
    /// percent-encoded, so the mapping is reversible via [`resolve_file`].
    ///
    /// [`resolve_file`]: StoragePlacement::resolve_file
    pub fn url_for(&self, path: &Path) -> Result<String> {
        let rel = path.strip_prefix(&self.uploads_root).map_err(|_| {
            DepotError::Validation(format!(
                "path {} is outside the uploads root",
                path.display()
            ))
        })?;

        let mut segments = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(seg) => {
                    let seg = seg.to_str().ok_or_else(|| {
                        DepotError::Validation("path is not valid UTF-8".to_string())
                    })?;
                    segments.push(urlencoding::encode(seg).into_owned());
                }
                _ => {
                    return Err(DepotError::Validation(format!(
                        "unexpected path component in {}",
                        rel.display()
                    )))
                }
            }
        }

        Ok(format!("{}/{}", self.base_url, segments.join("/")))
    }

    /// Resolve a stored public URL back to its filesystem path.
    ///
    /// Percent-decoding is applied per segment, since published URLs may
    /// contain encoded spaces and punctuation.
    pub fn resolve_file(&self, storage_url: &str) -> Result<PathBuf> {
        let url = Url::parse(storage_url)
            .map_err(|e| DepotError::Validation(format!("invalid storage URL: {e}")))?;
        let base = Url::parse(&self.base_url)
            .map_err(|e| DepotError::Config(format!("invalid base URL: {e}")))?;

        let rel = url
            .path()
            .strip_prefix(base.path())
            .ok_or_else(|| {
                DepotError::Validation(format!(
                    "storage URL {storage_url} is outside the configured base URL"
                ))
            })?
            .trim_start_matches('/');

        if rel.is_empty() {
            return Err(DepotError::Validation(
                "storage URL has no file path".to_string(),
            ));
        }

        let mut path = self.uploads_root.clone();
        for segment in rel.split('/') {
            let decoded = urlencoding::decode(segment)
                .map_err(|e| DepotError::Validation(format!("invalid URL encoding: {e}")))?;
            // Never allow an URL to walk outside the uploads root
            if decoded == ".." || decoded.is_empty() {
                return Err(DepotError::Validation(format!(
                    "invalid path segment in storage URL {storage_url}"
                )));
            }
            path.push(decoded.as_ref());
        }

        Ok(path)
    }

    /// Resolve the storage *directory* holding the file a URL points at.
    ///
    /// Used so an in-place update reuses the original directory, preserving
    /// sibling files not being replaced.
    pub fn resolve_dir(&self, storage_url: &str) -> Result<PathBuf> {
        let file = self.resolve_file(storage_url)?;
        file.parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                DepotError::Validation(format!(
                    "storage URL {storage_url} has no parent directory"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement() -> StoragePlacement {
        StoragePlacement::new("uploads", "http://localhost:3000/uploads")
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(StoragePlacement::sanitize_name("My App"), "my_app");
        assert_eq!(StoragePlacement::sanitize_name("Notes2Go!"), "notes2go_");
        assert_eq!(StoragePlacement::sanitize_name("abc-123"), "abc_123");
        assert_eq!(StoragePlacement::sanitize_name("日本語"), "___");
    }

    #[test]
    fn test_new_artifact_dir_layout() {
        let placement = placement();
        let dir = placement.new_artifact_dir(7, "My App");
        let dir = dir.to_str().unwrap();

        assert!(dir.starts_with("uploads/7/my_app-"));
        // 32 hex chars of the key follow the sanitized name
        let key = dir.rsplit('-').next().unwrap();
        assert_eq!(key.len(), 32);
    }

    #[test]
    fn test_new_artifact_dirs_are_unique() {
        let placement = placement();
        let a = placement.new_artifact_dir(1, "same name");
        let b = placement.new_artifact_dir(1, "same name");
        assert_ne!(a, b);
    }

    #[test]
    fn test_stored_file_name() {
        let name = StoragePlacement::stored_file_name("main", "release.apk");
        assert!(name.starts_with("main-"));
        assert!(name.ends_with(".apk"));

        let name = StoragePlacement::stored_file_name("icon", "no_extension");
        assert!(name.ends_with(".bin"));
    }

    #[test]
    fn test_extract_extension() {
        assert_eq!(StoragePlacement::extract_extension("app.apk"), "apk");
        assert_eq!(StoragePlacement::extract_extension("file.tar.gz"), "gz");
        assert_eq!(StoragePlacement::extract_extension("no_ext"), "bin");
        assert_eq!(StoragePlacement::extract_extension(".hidden"), "bin");
    }

    #[test]
    fn test_url_round_trip() {
        let placement = placement();
        let path = Path::new("uploads/3/my_app-abc123/main-def.apk");

        let url = placement.url_for(path).unwrap();
        assert_eq!(
            url,
            "http://localhost:3000/uploads/3/my_app-abc123/main-def.apk"
        );

        let resolved = placement.resolve_file(&url).unwrap();
        assert_eq!(resolved, path);
    }

    #[test]
    fn test_url_round_trip_with_spaces() {
        let placement = placement();
        let path = Path::new("uploads/3/dir/file with spaces.png");

        let url = placement.url_for(path).unwrap();
        assert!(url.contains("file%20with%20spaces.png"));

        let resolved = placement.resolve_file(&url).unwrap();
        assert_eq!(resolved, path);
    }

    #[test]
    fn test_url_for_outside_root() {
        let placement = placement();
        let result = placement.url_for(Path::new("elsewhere/file.bin"));
        assert!(matches!(result, Err(DepotError::Validation(_))));
    }

    #[test]
    fn test_resolve_dir() {
        let placement = placement();
        let dir = placement
            .resolve_dir("http://localhost:3000/uploads/1/app-k/main-x.apk")
            .unwrap();
        assert_eq!(dir, Path::new("uploads/1/app-k"));
    }

    #[test]
    fn test_resolve_rejects_foreign_base() {
        let placement = placement();
        let result = placement.resolve_file("http://localhost:3000/other/1/file.bin");
        assert!(matches!(result, Err(DepotError::Validation(_))));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let placement = placement();
        let result = placement.resolve_file("http://localhost:3000/uploads/1/%2E%2E/etc");
        assert!(matches!(result, Err(DepotError::Validation(_))));
    }

    #[test]
    fn test_resolve_rejects_invalid_url() {
        let placement = placement();
        let result = placement.resolve_file("not a url");
        assert!(matches!(result, Err(DepotError::Validation(_))));
    }

    #[test]
    fn test_staging_root() {
        let placement = placement();
        assert_eq!(placement.staging_root(), Path::new("uploads/temp"));
    }
}
