//! Upload Routes
//!
//! HTTP endpoints for the chunked upload protocol.
//!
//! Endpoints:
//! - POST /fileUpload/chunk - Upload one chunk (multipart form)
//! - GET /fileUpload/chunk - Check uploaded chunks / instant-upload
//! - DELETE /fileUpload/chunk - Abandon an upload
//! - POST /fileUpload/mergeFile - Assemble chunks into the final file

use std::path::PathBuf;

use axum::body::Bytes;
use axum::extract::{Multipart, Query, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::response::ApiResult;
use crate::state::AppState;
use crate::transfer::{ChunkInfo, TransferError, UploadedFileInfo};

// ============================================================================
// Router
// ============================================================================

/// Create the upload router
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/chunk",
            post(upload_chunk).get(check_chunk).delete(delete_chunk),
        )
        .route("/mergeFile", post(merge_file))
}

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadFolderQuery {
    upload_folder_path: PathBuf,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckChunkQuery {
    identifier: String,
    filename: String,
    upload_folder_path: PathBuf,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteChunkQuery {
    identifier: String,
    upload_folder_path: PathBuf,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /fileUpload/chunk
///
/// Upload a single chunk as a multipart form: the uploader's metadata
/// fields plus the chunk payload in the `file` part.
async fn upload_chunk(
    State(state): State<AppState>,
    Query(query): Query<UploadFolderQuery>,
    multipart: Multipart,
) -> ApiResult {
    let (info, bytes) = match parse_chunk_form(multipart).await {
        Ok(parsed) => parsed,
        Err(err) => return ApiResult::error(err.to_string()),
    };

    match state
        .transfer()
        .upload_chunk(&query.upload_folder_path, &info, &bytes)
        .await
    {
        Ok(()) => ApiResult::ok(),
        Err(err) => {
            tracing::error!(
                identifier = %info.identifier,
                chunk = info.chunk_number,
                error = %err,
                "chunk upload failed"
            );
            ApiResult::error("upload failed")
        }
    }
}

/// GET /fileUpload/chunk
///
/// Report whether the complete file already exists (instant upload) and
/// which chunk indices are already present (resume).
async fn check_chunk(
    State(state): State<AppState>,
    Query(query): Query<CheckChunkQuery>,
) -> ApiResult {
    match state
        .transfer()
        .check_chunk(&query.upload_folder_path, &query.identifier, &query.filename)
        .await
    {
        Ok(check) => ApiResult::ok().data("chunkResult", json!(check)),
        Err(err) => {
            tracing::error!(identifier = %query.identifier, error = %err, "chunk check failed");
            ApiResult::error("failed to check uploaded chunks")
        }
    }
}

/// DELETE /fileUpload/chunk
///
/// Abandon an in-progress upload, removing every stored chunk.
async fn delete_chunk(
    State(state): State<AppState>,
    Query(query): Query<DeleteChunkQuery>,
) -> ApiResult {
    match state
        .transfer()
        .delete_upload(&query.upload_folder_path, &query.identifier)
        .await
    {
        Ok(()) => ApiResult::ok(),
        Err(err) => {
            tracing::error!(identifier = %query.identifier, error = %err, "upload delete failed");
            ApiResult::error("failed to delete upload")
        }
    }
}

/// POST /fileUpload/mergeFile
///
/// Assemble all uploaded chunks into the final file.
async fn merge_file(
    State(state): State<AppState>,
    Query(query): Query<UploadFolderQuery>,
    Json(info): Json<UploadedFileInfo>,
) -> ApiResult {
    tracing::info!(
        identifier = %info.unique_identifier,
        file_name = %info.name,
        "starting merge"
    );

    match state
        .transfer()
        .merge(&query.upload_folder_path, &info.unique_identifier, &info.name)
        .await
    {
        Ok(()) => {
            tracing::info!(file_name = %info.name, "merge finished");
            ApiResult::ok()
        }
        Err(err) => {
            tracing::error!(file_name = %info.name, error = %err, "merge failed");
            ApiResult::error("file merge failed")
        }
    }
}

// ============================================================================
// Multipart Parsing
// ============================================================================

/// Pull the chunk metadata fields and the payload out of the multipart form.
async fn parse_chunk_form(
    mut multipart: Multipart,
) -> Result<(ChunkInfo, Bytes), TransferError> {
    let mut chunk_number: Option<u32> = None;
    let mut identifier: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut chunk_size: Option<u64> = None;
    let mut current_chunk_size: Option<u64> = None;
    let mut total_size: Option<u64> = None;
    let mut total_chunks: Option<u32> = None;
    let mut relative_path: Option<String> = None;
    let mut bytes: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| TransferError::InvalidChunk(format!("bad multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "file" {
            bytes = Some(field.bytes().await.map_err(|e| {
                TransferError::InvalidChunk(format!("failed to read chunk payload: {e}"))
            })?);
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| TransferError::InvalidChunk(format!("failed to read field {name}: {e}")))?;

        match name.as_str() {
            "chunkNumber" => chunk_number = Some(parse_number(&name, &text)?),
            "identifier" => identifier = Some(text),
            "filename" => filename = Some(text),
            "chunkSize" => chunk_size = Some(parse_number(&name, &text)?),
            "currentChunkSize" => current_chunk_size = Some(parse_number(&name, &text)?),
            "totalSize" => total_size = Some(parse_number(&name, &text)?),
            "totalChunks" => total_chunks = Some(parse_number(&name, &text)?),
            "relativePath" => relative_path = Some(text),
            other => {
                tracing::debug!(field = %other, "ignoring unknown multipart field");
            }
        }
    }

    let info = ChunkInfo {
        chunk_number: chunk_number
            .ok_or_else(|| TransferError::InvalidChunk("missing chunkNumber".to_string()))?,
        identifier: identifier
            .ok_or_else(|| TransferError::InvalidChunk("missing identifier".to_string()))?,
        filename: filename
            .ok_or_else(|| TransferError::InvalidChunk("missing filename".to_string()))?,
        chunk_size,
        current_chunk_size,
        total_size,
        total_chunks,
        relative_path,
    };

    let bytes =
        bytes.ok_or_else(|| TransferError::InvalidChunk("missing file part".to_string()))?;

    Ok((info, bytes))
}

fn parse_number<T: std::str::FromStr>(name: &str, text: &str) -> Result<T, TransferError> {
    text.parse()
        .map_err(|_| TransferError::InvalidChunk(format!("invalid {name}: {text}")))
}
