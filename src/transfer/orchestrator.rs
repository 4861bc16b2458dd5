//! Transfer Orchestrator
//!
//! Coordinates the path resolver, chunk store, merge engine and range
//! extractor behind the protocol operations. Upload state is derived from
//! the filesystem on every call; the only in-memory state is a map of
//! per-identifier locks.
//!
//! Locking discipline (shared resource is the upload directory tree):
//! - chunk uploads take the read side of the identifier's lock: uploads of
//!   different indices run concurrently, re-uploads of the same index are
//!   last-writer-wins
//! - merge and delete take the write side, so they never run while a chunk
//!   write for the same identifier is in flight

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::chunk_store::ChunkStore;
use super::merge::MergeEngine;
use super::paths::PathResolver;
use super::range::{self, ByteRange};
use super::types::{ChunkCheck, ChunkInfo, FileInfo, TransferError, UploadState};

// ============================================================================
// Upload State Machine
// ============================================================================

/// Existence checks the state machine needs, abstracted so the state
/// function can be exercised without touching a real filesystem.
pub trait DirectoryView {
    fn dir_exists(&self, path: &Path) -> bool;
    fn file_exists(&self, path: &Path) -> bool;
}

/// The real filesystem view
pub struct FsView;

impl DirectoryView for FsView {
    fn dir_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn file_exists(&self, path: &Path) -> bool {
        ChunkStore::exists_no_follow(path)
    }
}

/// Derive the state of one upload from directory-existence results.
///
/// A present merged file wins over everything else: a directory that still
/// holds stray chunk files is Complete once the merged file exists.
pub fn upload_state<V: DirectoryView>(
    view: &V,
    upload_dir: &Path,
    merged_path: &Path,
) -> UploadState {
    if view.file_exists(merged_path) {
        UploadState::Complete
    } else if view.dir_exists(upload_dir) {
        UploadState::InProgress
    } else {
        UploadState::NotStarted
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Coordinates chunk uploads, merges and range downloads.
#[derive(Clone)]
pub struct TransferOrchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    resolver: PathResolver,
    store: ChunkStore,
    merger: MergeEngine,
    copy_buffer_size: usize,

    /// Per-identifier locks serializing merge/delete against chunk uploads.
    /// Entries are kept for the life of the process; the map is bounded by
    /// the number of distinct identifiers seen.
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl TransferOrchestrator {
    pub fn new(separator: impl Into<String>, copy_buffer_size: usize) -> Self {
        let resolver = PathResolver::new(separator);

        Self {
            inner: Arc::new(OrchestratorInner {
                store: ChunkStore::new(resolver.clone()),
                merger: MergeEngine::new(resolver.clone()),
                resolver,
                copy_buffer_size,
                locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn copy_buffer_size(&self) -> usize {
        self.inner.copy_buffer_size
    }

    async fn identifier_lock(&self, identifier: &str) -> Arc<RwLock<()>> {
        let mut locks = self.inner.locks.lock().await;
        locks.entry(identifier.to_string()).or_default().clone()
    }

    // ========================================================================
    // Upload Operations
    // ========================================================================

    /// Write one uploaded chunk. Creates the upload directory on first
    /// contact (NotStarted -> InProgress); re-uploading an index overwrites.
    pub async fn upload_chunk(
        &self,
        upload_root: &Path,
        info: &ChunkInfo,
        bytes: &[u8],
    ) -> Result<(), TransferError> {
        let lock = self.identifier_lock(&info.identifier).await;
        let _guard = lock.read().await;

        let path = self.inner.resolver.chunk_path(upload_root, info).await?;
        self.inner.store.write_chunk(&path, bytes).await?;

        tracing::debug!(
            identifier = %info.identifier,
            chunk = info.chunk_number,
            size = bytes.len(),
            "chunk stored"
        );

        Ok(())
    }

    /// Report whether the upload can be skipped entirely and which chunk
    /// indices are already present.
    pub async fn check_chunk(
        &self,
        upload_root: &Path,
        identifier: &str,
        filename: &str,
    ) -> Result<ChunkCheck, TransferError> {
        let dir = self.inner.resolver.upload_dir(upload_root, identifier);
        let merged = self.inner.resolver.merged_path(upload_root, identifier, filename);

        match upload_state(&FsView, &dir, &merged) {
            UploadState::Complete => {
                tracing::info!(identifier = %identifier, "complete file present, instant upload");
                Ok(ChunkCheck {
                    skip_upload: true,
                    uploaded_chunks: Vec::new(),
                    location: Some(merged.display().to_string()),
                })
            }
            UploadState::InProgress => Ok(ChunkCheck {
                skip_upload: false,
                uploaded_chunks: self.inner.store.uploaded_chunks(&dir, filename).await?,
                location: None,
            }),
            UploadState::NotStarted => Ok(ChunkCheck::default()),
        }
    }

    /// Abandon an upload: remove its directory and every chunk in it.
    /// Idempotent; an identifier that was never started is a no-op success.
    pub async fn delete_upload(
        &self,
        upload_root: &Path,
        identifier: &str,
    ) -> Result<(), TransferError> {
        let lock = self.identifier_lock(identifier).await;
        let _guard = lock.write().await;

        let dir = self.inner.resolver.upload_dir(upload_root, identifier);
        self.inner.store.delete_upload_dir(&dir).await
    }

    /// Assemble all chunks of an identifier into the merged file
    /// (InProgress -> Complete). Serialized against in-flight chunk uploads
    /// for the same identifier.
    pub async fn merge(
        &self,
        upload_root: &Path,
        identifier: &str,
        filename: &str,
    ) -> Result<(), TransferError> {
        let lock = self.identifier_lock(identifier).await;
        let _guard = lock.write().await;

        let dir = self.inner.resolver.upload_dir(upload_root, identifier);
        let merged = self.inner.resolver.merged_path(upload_root, identifier, filename);

        if upload_state(&FsView, &dir, &merged) == UploadState::NotStarted {
            return Err(TransferError::NotFound(format!(
                "no uploaded chunks for identifier {identifier}"
            )));
        }

        self.inner.merger.merge(&merged, &dir, filename).await
    }

    // ========================================================================
    // Download Operations
    // ========================================================================

    /// Metadata for a downloadable file. Stateless.
    pub async fn file_info(&self, folder: &Path, file_name: &str) -> FileInfo {
        range::file_info(&folder.join(file_name)).await
    }

    /// Validate a range download request: file must exist, header must be
    /// present and well formed. Returns the resolved path, the clamped range
    /// and the total file size for the Content-Range header.
    pub async fn resolve_range(
        &self,
        folder: &Path,
        file_name: &str,
        range_header: Option<&str>,
    ) -> Result<(PathBuf, ByteRange, u64), TransferError> {
        let path = folder.join(file_name);

        let info = range::file_info(&path).await;
        if !info.exists {
            return Err(TransferError::NotFound(file_name.to_string()));
        }

        let header = range_header
            .ok_or_else(|| TransferError::MalformedRange("missing Range header".to_string()))?;

        let range = ByteRange::parse(header, info.file_length)?;
        Ok((path, range, info.file_length))
    }

    /// Read the bytes of chunk `chunk_index` (1-based) of a file, addressed
    /// as `offset = chunk_size * (chunk_index - 1)`. The final chunk may be
    /// shorter than `chunk_size`.
    pub async fn chunk_by_index(
        &self,
        folder: &Path,
        file_name: &str,
        chunk_size: u64,
        chunk_index: u32,
    ) -> Result<Vec<u8>, TransferError> {
        if chunk_size == 0 || chunk_index == 0 {
            return Err(TransferError::InvalidChunk(format!(
                "chunkSize and chunkIndex must be positive, got {chunk_size} and {chunk_index}"
            )));
        }

        let path = folder.join(file_name);
        if !range::file_info(&path).await.exists {
            return Err(TransferError::NotFound(file_name.to_string()));
        }

        let offset = chunk_size
            .checked_mul(u64::from(chunk_index) - 1)
            .ok_or_else(|| {
                TransferError::InvalidChunk(format!(
                    "chunk offset overflows: {chunk_size} * ({chunk_index} - 1)"
                ))
            })?;

        range::read_chunk_at(&path, offset, chunk_size).await
    }
}

// ============================================================================
// Tests
// ============================================================================
