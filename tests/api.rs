//! End-to-end API tests: chunked upload, merge, and range downloads
//! exercised through the HTTP surface.

use axum::http::{header, HeaderValue, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use ferry_server::config::Config;
use ferry_server::routes;
use ferry_server::state::AppState;

fn server() -> TestServer {
    let state = AppState::new(Config::default());
    TestServer::new(routes::app(state)).expect("failed to build test server")
}

fn source_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn chunk_form(identifier: &str, filename: &str, number: u32, payload: &[u8]) -> MultipartForm {
    MultipartForm::new()
        .add_text("chunkNumber", number.to_string())
        .add_text("identifier", identifier.to_string())
        .add_text("filename", filename.to_string())
        .add_text("chunkSize", "100")
        .add_text("currentChunkSize", payload.len().to_string())
        .add_text("totalSize", "300")
        .add_text("totalChunks", "3")
        .add_part(
            "file",
            Part::bytes(payload.to_vec())
                .file_name(filename.to_string())
                .mime_type("application/octet-stream"),
        )
}

async fn check_chunk(server: &TestServer, root: &str, identifier: &str, filename: &str) -> Value {
    let response = server
        .get("/fileUpload/chunk")
        .add_query_param("identifier", identifier)
        .add_query_param("filename", filename)
        .add_query_param("uploadFolderPath", root)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));
    body["data"]["chunkResult"].clone()
}

#[tokio::test]
async fn test_upload_merge_download_cycle() {
    let server = server();
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().to_str().unwrap().to_string();
    let source = source_bytes(300);

    // fresh identifier: no skip, no chunks
    let check = check_chunk(&server, &root, "abc123", "x.bin").await;
    assert_eq!(check["skipUpload"], json!(false));
    assert_eq!(check["uploadedChunks"], json!([]));

    // upload 3 x 100-byte chunks, out of order
    for number in [2u32, 3, 1] {
        let start = (number as usize - 1) * 100;
        let response = server
            .post("/fileUpload/chunk")
            .add_query_param("uploadFolderPath", &root)
            .multipart(chunk_form("abc123", "x.bin", number, &source[start..start + 100]))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["success"], json!(true), "chunk {number}: {body}");
    }

    // resume view lists all three
    let check = check_chunk(&server, &root, "abc123", "x.bin").await;
    assert_eq!(check["skipUpload"], json!(false));
    assert_eq!(check["uploadedChunks"], json!([1, 2, 3]));

    // merge
    let response = server
        .post("/fileUpload/mergeFile")
        .add_query_param("uploadFolderPath", &root)
        .json(&json!({ "name": "x.bin", "uniqueIdentifier": "abc123", "size": 300 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));

    // merged file is byte-identical, chunk files are gone
    let upload_dir = temp_dir.path().join("abc123");
    let merged = std::fs::read(upload_dir.join("x.bin")).unwrap();
    assert_eq!(merged, source);
    let entries: Vec<_> = std::fs::read_dir(&upload_dir).unwrap().collect();
    assert_eq!(entries.len(), 1, "only the merged file should remain");

    // merging again is a no-op success
    let response = server
        .post("/fileUpload/mergeFile")
        .add_query_param("uploadFolderPath", &root)
        .json(&json!({ "name": "x.bin", "uniqueIdentifier": "abc123" }))
        .await;
    assert_eq!(response.json::<Value>()["success"], json!(true));
    assert_eq!(std::fs::read(upload_dir.join("x.bin")).unwrap(), source);

    // complete upload reports instant-upload
    let check = check_chunk(&server, &root, "abc123", "x.bin").await;
    assert_eq!(check["skipUpload"], json!(true));
    assert_eq!(check["uploadedChunks"], json!([]));
    assert!(check["location"].as_str().unwrap().ends_with("x.bin"));

    // file info off the download side
    let folder = upload_dir.to_str().unwrap().to_string();
    let response = server
        .get("/fileDownload/getFileInfo")
        .add_query_param("downloadFolderPath", &folder)
        .add_query_param("fileName", "x.bin")
        .await;
    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["fileLength"], json!(300));

    // range bytes=250-1000 on a 300-byte file: clamped to [250, 299]
    let response = server
        .get("/fileDownload/chunk")
        .add_query_param("downloadFolderPath", &folder)
        .add_query_param("fileName", "x.bin")
        .add_header(header::RANGE, HeaderValue::from_static("bytes=250-1000"))
        .await;

    assert_eq!(response.status_code(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.header(header::CONTENT_RANGE),
        HeaderValue::from_static("bytes 250-299/300")
    );
    assert_eq!(
        response.header(header::ACCEPT_RANGES),
        HeaderValue::from_static("bytes")
    );
    assert_eq!(response.as_bytes().as_ref(), &source[250..300]);

    // chunk-by-index addressing: chunk 3 of size 100 is bytes [200, 299]
    let response = server
        .get("/fileDownload/chunkByIndex")
        .add_query_param("downloadFolderPath", &folder)
        .add_query_param("fileName", "x.bin")
        .add_query_param("chunkSize", "100")
        .add_query_param("chunkIndex", "3")
        .await;

    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), &source[200..300]);

    // abandon: delete the upload, identifier is fresh again
    let response = server
        .delete("/fileUpload/chunk")
        .add_query_param("identifier", "abc123")
        .add_query_param("uploadFolderPath", &root)
        .await;
    assert_eq!(response.json::<Value>()["success"], json!(true));

    let check = check_chunk(&server, &root, "abc123", "x.bin").await;
    assert_eq!(check["skipUpload"], json!(false));
    assert_eq!(check["uploadedChunks"], json!([]));
}

#[tokio::test]
async fn test_delete_unknown_upload_is_ok() {
    let server = server();
    let temp_dir = TempDir::new().unwrap();

    let response = server
        .delete("/fileUpload/chunk")
        .add_query_param("identifier", "never-started")
        .add_query_param("uploadFolderPath", temp_dir.path().to_str().unwrap())
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["success"], json!(true));
}

#[tokio::test]
async fn test_get_file_info_missing_file() {
    let server = server();
    let temp_dir = TempDir::new().unwrap();

    let response = server
        .get("/fileDownload/getFileInfo")
        .add_query_param("downloadFolderPath", temp_dir.path().to_str().unwrap())
        .add_query_param("fileName", "missing.bin")
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["code"], json!(20001));
}

#[tokio::test]
async fn test_range_download_edge_cases() {
    let server = server();
    let temp_dir = TempDir::new().unwrap();
    let folder = temp_dir.path().to_str().unwrap().to_string();
    let source = source_bytes(300);
    std::fs::write(temp_dir.path().join("x.bin"), &source).unwrap();

    // open-ended range
    let response = server
        .get("/fileDownload/chunk")
        .add_query_param("downloadFolderPath", &folder)
        .add_query_param("fileName", "x.bin")
        .add_header(header::RANGE, HeaderValue::from_static("bytes=100-"))
        .await;
    assert_eq!(response.status_code(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.header(header::CONTENT_RANGE),
        HeaderValue::from_static("bytes 100-299/300")
    );
    assert_eq!(response.as_bytes().as_ref(), &source[100..]);

    // missing Range header is a client error, not a crash
    let response = server
        .get("/fileDownload/chunk")
        .add_query_param("downloadFolderPath", &folder)
        .add_query_param("fileName", "x.bin")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["success"], json!(false));

    // malformed header
    let response = server
        .get("/fileDownload/chunk")
        .add_query_param("downloadFolderPath", &folder)
        .add_query_param("fileName", "x.bin")
        .add_header(header::RANGE, HeaderValue::from_static("bytes=10-5,6-7"))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    // start past the end of the file
    let response = server
        .get("/fileDownload/chunk")
        .add_query_param("downloadFolderPath", &folder)
        .add_query_param("fileName", "x.bin")
        .add_header(header::RANGE, HeaderValue::from_static("bytes=300-400"))
        .await;
    assert_eq!(response.status_code(), StatusCode::RANGE_NOT_SATISFIABLE);

    // short final chunk by index: chunk 4 of 90 covers bytes [270, 299]
    let response = server
        .get("/fileDownload/chunkByIndex")
        .add_query_param("downloadFolderPath", &folder)
        .add_query_param("fileName", "x.bin")
        .add_query_param("chunkSize", "90")
        .add_query_param("chunkIndex", "4")
        .await;
    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), &source[270..]);
}

#[tokio::test]
async fn test_upload_chunk_missing_fields() {
    let server = server();
    let temp_dir = TempDir::new().unwrap();

    let form = MultipartForm::new()
        .add_text("identifier", "abc123")
        .add_part("file", Part::bytes(vec![1, 2, 3]));

    let response = server
        .post("/fileUpload/chunk")
        .add_query_param("uploadFolderPath", temp_dir.path().to_str().unwrap())
        .multipart(form)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], json!(false));
    assert!(body["message"].as_str().unwrap().contains("chunkNumber"));
}
