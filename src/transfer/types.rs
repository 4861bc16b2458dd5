//! Transfer types for the chunked upload/download protocol

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Default separator between the file name and the chunk index on disk
pub const DEFAULT_CHUNK_SEPARATOR: &str = "_";

/// Default copy buffer size for range downloads: 64KB
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 64 * 1024;

// ============================================================================
// Upload Types
// ============================================================================

/// Metadata describing one uploaded chunk, as sent by the client in the
/// multipart upload form.
///
/// `chunk_number` is 1-based and assigned by the client. Only `chunk_number`,
/// `identifier` and `filename` drive placement; the remaining fields are
/// uploader bookkeeping that the server accepts but does not act on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInfo {
    /// 1-based chunk index
    pub chunk_number: u32,

    /// Content fingerprint of the whole file (upload session key)
    pub identifier: String,

    /// Original file name
    pub filename: String,

    /// Nominal chunk size used by the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,

    /// Actual size of this chunk (the final chunk may be shorter)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_chunk_size: Option<u64>,

    /// Total size of the file being uploaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,

    /// Total number of chunks the client will send
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u32>,

    /// Client-side relative path of the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
}

/// Metadata describing a fully uploaded file, sent with the merge request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFileInfo {
    /// Original file name
    pub name: String,

    /// Content fingerprint of the whole file (upload session key)
    pub unique_identifier: String,

    /// Client-side attachment id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// File type / extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,

    /// Total size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Client-side relative path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
}

/// Result of a check-chunk call: whether the client can skip the upload
/// entirely, and which chunk indices the server already holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkCheck {
    /// Server already holds the complete file for this identifier
    pub skip_upload: bool,

    /// Chunk indices present on the server (resume support)
    pub uploaded_chunks: Vec<u32>,

    /// Location of the complete file, when `skip_upload` is true
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

// ============================================================================
// Download Types
// ============================================================================

/// Basic file metadata for the download side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub exists: bool,
    pub file_length: u64,
}

// ============================================================================
// Upload State
// ============================================================================

/// State of one upload identifier, derived entirely from the filesystem.
///
/// There is no session table: the upload directory and the merged file are
/// the only state carriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    /// No upload directory for this identifier
    NotStarted,
    /// Upload directory exists, merged file does not
    InProgress,
    /// Merged file present
    Complete,
}

// ============================================================================
// Error Types
// ============================================================================

/// Transfer error types
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("malformed range: {0}")]
    MalformedRange(String),

    #[error("range start {start} is beyond the end of the file ({size} bytes)")]
    RangeNotSatisfiable { start: u64, size: u64 },

    #[error("failed to create directory {path}: {source}")]
    DirCreate {
        path: String,
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },

    #[error("merge failed: {0}")]
    MergeFailed(String),

    #[error("invalid chunk request: {0}")]
    InvalidChunk(String),
}

impl TransferError {
    /// Wrap an I/O error with a short description of what was being done
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MalformedRange(_) => StatusCode::BAD_REQUEST,
            Self::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::DirCreate { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MergeFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidChunk(_) => StatusCode::BAD_REQUEST,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_check_serializes_camel_case() {
        let check = ChunkCheck {
            skip_upload: true,
            uploaded_chunks: vec![1, 2],
            location: Some("/tmp/abc/x.bin".to_string()),
        };

        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json["skipUpload"], true);
        assert_eq!(json["uploadedChunks"], serde_json::json!([1, 2]));
        assert_eq!(json["location"], "/tmp/abc/x.bin");
    }

    #[test]
    fn chunk_check_omits_absent_location() {
        let check = ChunkCheck::default();
        let json = serde_json::to_value(&check).unwrap();
        assert!(json.get("location").is_none());
    }

    #[test]
    fn error_status_codes() {
        use axum::http::StatusCode;

        assert_eq!(
            TransferError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            TransferError::MalformedRange("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            TransferError::RangeNotSatisfiable { start: 10, size: 5 }.status_code(),
            StatusCode::RANGE_NOT_SATISFIABLE
        );
    }
}
