//! Download Routes
//!
//! HTTP endpoints for whole-file metadata and range-addressed downloads.
//!
//! Endpoints:
//! - GET /fileDownload/getFileInfo - File existence and size
//! - GET /fileDownload/chunk - Range download (Range header, 206 response)
//! - GET /fileDownload/chunkByIndex - Chunk download by index and size

use std::path::PathBuf;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;

use crate::response::ApiResult;
use crate::state::AppState;
use crate::transfer::{range, TransferError};

// ============================================================================
// Router
// ============================================================================

/// Create the download router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/getFileInfo", get(get_file_info))
        .route("/chunk", get(download_chunk))
        .route("/chunkByIndex", get(download_chunk_by_index))
}

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileQuery {
    download_folder_path: PathBuf,
    file_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkByIndexQuery {
    download_folder_path: PathBuf,
    file_name: String,
    chunk_size: u64,
    chunk_index: u32,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /fileDownload/getFileInfo
///
/// Report whether the file exists and its size in bytes.
async fn get_file_info(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> ApiResult {
    let info = state
        .transfer()
        .file_info(&query.download_folder_path, &query.file_name)
        .await;

    if info.exists {
        ApiResult::ok().data("fileLength", json!(info.file_length))
    } else {
        tracing::warn!(file_name = %query.file_name, "download file does not exist");
        ApiResult::error("download file does not exist")
    }
}

/// GET /fileDownload/chunk
///
/// Stream the byte span named by the Range header as a 206 partial-content
/// response. An end past the last byte is clamped, never rejected. Once
/// streaming has begun, an I/O failure terminates the body early.
async fn download_chunk(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
    headers: HeaderMap,
) -> Result<Response, TransferError> {
    let range_header = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    let (path, byte_range, total) = state
        .transfer()
        .resolve_range(&query.download_folder_path, &query.file_name, range_header)
        .await?;

    tracing::debug!(
        file = %path.display(),
        start = byte_range.start,
        end = byte_range.end,
        "streaming range"
    );

    let buffer_size = state.transfer().copy_buffer_size();
    let (mut writer, reader) = tokio::io::duplex(buffer_size.max(8 * 1024));

    tokio::spawn(async move {
        if let Err(err) = range::stream_range(&path, byte_range, buffer_size, &mut writer).await {
            // the client sees a truncated body; nothing more we can send
            tracing::error!(file = %path.display(), error = %err, "range download aborted");
        }
    });

    build_response(
        StatusCode::PARTIAL_CONTENT,
        &query.file_name,
        byte_range.len(),
        Some(format!(
            "bytes {}-{}/{}",
            byte_range.start, byte_range.end, total
        )),
        Body::from_stream(ReaderStream::new(reader)),
    )
}

/// GET /fileDownload/chunkByIndex
///
/// Return the bytes of one chunk, addressed by chunk size and 1-based
/// index. The final chunk of a file may be shorter than requested.
async fn download_chunk_by_index(
    State(state): State<AppState>,
    Query(query): Query<ChunkByIndexQuery>,
) -> Result<Response, TransferError> {
    let bytes = state
        .transfer()
        .chunk_by_index(
            &query.download_folder_path,
            &query.file_name,
            query.chunk_size,
            query.chunk_index,
        )
        .await?;

    build_response(
        StatusCode::OK,
        &query.file_name,
        bytes.len() as u64,
        None,
        Body::from(bytes),
    )
}

// ============================================================================
// Helpers
// ============================================================================

fn build_response(
    status: StatusCode,
    file_name: &str,
    content_length: u64,
    content_range: Option<String>,
    body: Body,
) -> Result<Response, TransferError> {
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", urlencoding::encode(file_name)),
        )
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, content_length);

    if let Some(content_range) = content_range {
        builder = builder.header(header::CONTENT_RANGE, content_range);
    }

    builder.body(body).map_err(|e| {
        TransferError::io(
            "failed to build download response",
            std::io::Error::new(std::io::ErrorKind::Other, e),
        )
    })
}
