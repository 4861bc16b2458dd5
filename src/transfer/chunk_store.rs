//! Chunk Store
//!
//! Filesystem storage for uploaded chunks. Chunks live as sibling files in
//! one directory per upload identifier; the set of uploaded indices is
//! recomputed from a directory listing on every call, never cached.

use std::path::Path;

use super::paths::PathResolver;
use super::types::TransferError;

/// Writes, lists and deletes chunk files for one upload root.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    resolver: PathResolver,
}

impl ChunkStore {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// Write the full chunk payload to `path`, overwriting any previous
    /// content. Clients legitimately re-send a chunk after a dropped
    /// connection, so overwrite is the intended behavior.
    pub async fn write_chunk(&self, path: &Path, bytes: &[u8]) -> Result<(), TransferError> {
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| TransferError::io(format!("failed to write chunk {}", path.display()), e))
    }

    /// List the chunk indices already present for an upload, excluding the
    /// merged file itself.
    ///
    /// A missing directory means zero chunks uploaded so far, not an error.
    /// Entries without a parseable chunk suffix are skipped with a warning.
    pub async fn uploaded_chunks(
        &self,
        upload_dir: &Path,
        merged_name: &str,
    ) -> Result<Vec<u32>, TransferError> {
        let mut entries = match tokio::fs::read_dir(upload_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %upload_dir.display(), "upload directory missing, no chunks yet");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(TransferError::io(
                    format!("failed to list upload directory {}", upload_dir.display()),
                    e,
                ));
            }
        };

        let mut indices = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            TransferError::io(
                format!("failed to read upload directory {}", upload_dir.display()),
                e,
            )
        })? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == merged_name {
                continue;
            }

            match self.resolver.chunk_index(&name) {
                Some(index) => indices.push(index),
                None => {
                    tracing::warn!(entry = %name, "ignoring entry without a chunk suffix");
                }
            }
        }

        indices.sort_unstable();
        Ok(indices)
    }

    /// Existence check that does not trust symbolic links: a symlink, broken
    /// or not, counts as absent.
    pub fn exists_no_follow(path: &Path) -> bool {
        match std::fs::symlink_metadata(path) {
            Ok(meta) => !meta.file_type().is_symlink(),
            Err(_) => false,
        }
    }

    /// Recursively delete an upload directory and everything in it.
    /// A missing directory is a no-op success: delete is idempotent.
    pub async fn delete_upload_dir(&self, upload_dir: &Path) -> Result<(), TransferError> {
        match tokio::fs::remove_dir_all(upload_dir).await {
            Ok(()) => {
                tracing::info!(dir = %upload_dir.display(), "deleted upload directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TransferError::io(
                format!("failed to delete upload directory {}", upload_dir.display()),
                e,
            )),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
