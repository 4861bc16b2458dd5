//! Merge Engine
//!
//! Reassembles the chunks of one upload identifier into the final file,
//! in ascending numeric chunk order.
//!
//! Guarantees:
//! - Idempotent: an existing merged file is returned as success untouched,
//!   which is also what makes "instant upload" work.
//! - Numeric ordering: `x.bin_2` is appended before `x.bin_10`.
//! - Two-phase: chunk files are deleted only after every append succeeded.
//!   A failed append removes the partial output and leaves all chunks in
//!   place, so the upload stays fully retryable.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use super::chunk_store::ChunkStore;
use super::paths::PathResolver;
use super::types::TransferError;

/// Assembles chunk files into the merged result.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    resolver: PathResolver,
}

impl MergeEngine {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// Merge every chunk in `upload_dir` into `merged_path`.
    ///
    /// `merged_name` is the file name of the merged result, excluded from
    /// the chunk listing.
    pub async fn merge(
        &self,
        merged_path: &Path,
        upload_dir: &Path,
        merged_name: &str,
    ) -> Result<(), TransferError> {
        if ChunkStore::exists_no_follow(merged_path) {
            tracing::info!(file = %merged_path.display(), "merged file already exists, skipping merge");
            return Ok(());
        }

        let chunks = self.sorted_chunks(upload_dir, merged_name).await?;

        let mut output = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(merged_path)
            .await
        {
            Ok(file) => file,
            // another merge won the race; the file it produced is the result
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(()),
            Err(e) => {
                return Err(TransferError::io(
                    format!("failed to create merged file {}", merged_path.display()),
                    e,
                ));
            }
        };

        if let Err(err) = self.append_all(&mut output, &chunks).await {
            drop(output);
            if let Err(e) = tokio::fs::remove_file(merged_path).await {
                tracing::warn!(
                    file = %merged_path.display(),
                    error = %e,
                    "failed to remove partial merged file"
                );
            }
            return Err(err);
        }

        // all appends succeeded; now the chunk files can go
        for (_, path) in &chunks {
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::warn!(chunk = %path.display(), error = %e, "failed to delete merged chunk");
            }
        }

        tracing::info!(
            file = %merged_path.display(),
            chunks = chunks.len(),
            "merge complete"
        );

        Ok(())
    }

    /// List chunk files sorted ascending by numeric index.
    ///
    /// Any entry without a parseable chunk suffix fails the merge: a foreign
    /// file must not be folded into the output.
    async fn sorted_chunks(
        &self,
        upload_dir: &Path,
        merged_name: &str,
    ) -> Result<Vec<(u32, PathBuf)>, TransferError> {
        let mut entries = tokio::fs::read_dir(upload_dir).await.map_err(|e| {
            TransferError::io(
                format!("failed to list upload directory {}", upload_dir.display()),
                e,
            )
        })?;

        let mut chunks = Vec::new();
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
                Some(index) => chunks.push((index, entry.path())),
                None => {
                    return Err(TransferError::MergeFailed(format!(
                        "unexpected entry {name} in upload directory {}",
                        upload_dir.display()
                    )));
                }
            }
        }

        chunks.sort_unstable_by_key(|(index, _)| *index);
        Ok(chunks)
    }

    async fn append_all(
        &self,
        output: &mut tokio::fs::File,
        chunks: &[(u32, PathBuf)],
    ) -> Result<(), TransferError> {
        for (index, path) in chunks {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                TransferError::io(format!("failed to read chunk {}", path.display()), e)
            })?;

            output.write_all(&bytes).await.map_err(|e| {
                TransferError::io(format!("failed to append chunk {index}"), e)
            })?;
        }

        output
            .flush()
            .await
            .map_err(|e| TransferError::io("failed to flush merged file", e))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine() -> MergeEngine {
        MergeEngine::new(PathResolver::new("_"))
    }

    async fn write_chunk(dir: &Path, name: &str, bytes: &[u8]) {
        tokio::fs::write(dir.join(name), bytes).await.unwrap();
    }

    #[tokio::test]
    async fn test_merge_orders_numerically() {
        let temp_dir = TempDir::new().unwrap();
        let merged = temp_dir.path().join("x.bin");

        // 11 chunks: lexicographic order would put 10 and 11 before 2
        for i in 1..=11u32 {
            write_chunk(temp_dir.path(), &format!("x.bin_{i}"), format!("[{i}]").as_bytes())
                .await;
        }

        engine()
            .merge(&merged, temp_dir.path(), "x.bin")
            .await
            .unwrap();

        let content = tokio::fs::read_to_string(&merged).await.unwrap();
        assert_eq!(
            content,
            "[1][2][3][4][5][6][7][8][9][10][11]"
        );
    }

    #[tokio::test]
    async fn test_merge_deletes_chunks_after_success() {
        let temp_dir = TempDir::new().unwrap();
        let merged = temp_dir.path().join("x.bin");

        write_chunk(temp_dir.path(), "x.bin_1", b"aa").await;
        write_chunk(temp_dir.path(), "x.bin_2", b"bb").await;

        engine()
            .merge(&merged, temp_dir.path(), "x.bin")
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&merged).await.unwrap(), b"aabb");
        assert!(!temp_dir.path().join("x.bin_1").exists());
        assert!(!temp_dir.path().join("x.bin_2").exists());
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let merged = temp_dir.path().join("x.bin");

        write_chunk(temp_dir.path(), "x.bin_1", b"aa").await;

        let engine = engine();
        engine.merge(&merged, temp_dir.path(), "x.bin").await.unwrap();
        let first = tokio::fs::read(&merged).await.unwrap();

        // second call sees the merged file and does nothing
        engine.merge(&merged, temp_dir.path(), "x.bin").await.unwrap();
        assert_eq!(tokio::fs::read(&merged).await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_foreign_entry_aborts_before_any_append() {
        let temp_dir = TempDir::new().unwrap();
        let merged = temp_dir.path().join("x.bin");

        write_chunk(temp_dir.path(), "x.bin_1", b"aa").await;
        write_chunk(temp_dir.path(), "stray.tmp", b"??").await;

        let result = engine().merge(&merged, temp_dir.path(), "x.bin").await;

        assert!(matches!(result, Err(TransferError::MergeFailed(_))));
        // nothing was consumed and no output was left behind
        assert!(temp_dir.path().join("x.bin_1").exists());
        assert!(!merged.exists());
    }

    #[tokio::test]
    async fn test_merge_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let merged = temp_dir.path().join("gone").join("x.bin");

        let result = engine()
            .merge(&merged, &temp_dir.path().join("gone"), "x.bin")
            .await;

        assert!(result.is_err());
    }
}
