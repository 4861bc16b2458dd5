//! Path Resolver
//!
//! Derives on-disk locations for chunks and merged files from an upload
//! identifier, file name and chunk index. The separator between file name
//! and index is injected at construction so it can be varied and tested.

use std::path::{Path, PathBuf};

use super::types::{ChunkInfo, TransferError};

/// Resolves chunk and merged-file paths under an upload root.
///
/// Layout: `upload_root/<identifier>/<filename><sep><chunk_number>` per
/// chunk, `upload_root/<identifier>/<filename>` for the merged result.
#[derive(Debug, Clone)]
pub struct PathResolver {
    separator: String,
}

impl PathResolver {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Directory holding all chunks for one identifier
    pub fn upload_dir(&self, upload_root: &Path, identifier: &str) -> PathBuf {
        upload_root.join(identifier)
    }

    /// Path of the merged (fully assembled) file
    pub fn merged_path(&self, upload_root: &Path, identifier: &str, filename: &str) -> PathBuf {
        self.upload_dir(upload_root, identifier).join(filename)
    }

    /// On-disk file name of one chunk
    pub fn chunk_file_name(&self, filename: &str, chunk_number: u32) -> String {
        format!("{}{}{}", filename, self.separator, chunk_number)
    }

    /// Resolve the path for an uploaded chunk, creating the upload directory
    /// (and intermediates) when missing.
    ///
    /// Directory creation failure is surfaced so the dependent write never
    /// proceeds against a missing directory.
    pub async fn chunk_path(
        &self,
        upload_root: &Path,
        info: &ChunkInfo,
    ) -> Result<PathBuf, TransferError> {
        let dir = self.upload_dir(upload_root, &info.identifier);

        if tokio::fs::metadata(&dir).await.is_err() {
            tracing::info!(path = %dir.display(), "creating upload directory");
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|source| TransferError::DirCreate {
                    path: dir.display().to_string(),
                    source,
                })?;
        }

        Ok(dir.join(self.chunk_file_name(&info.filename, info.chunk_number)))
    }

    /// Parse the chunk index from a chunk file name: the integer after the
    /// LAST occurrence of the separator. Returns `None` for names without a
    /// separator or with a non-numeric suffix.
    pub fn chunk_index(&self, file_name: &str) -> Option<u32> {
        let pos = file_name.rfind(&self.separator)?;
        file_name[pos + self.separator.len()..].parse().ok()
    }
}

// ============================================================================
// Tests
// ============================================================================
