//! Route modules for Ferry Server

use axum::response::{IntoResponse, Json, Response};
use axum::Router;
use serde::Serialize;

use crate::response::ApiResult;
use crate::state::AppState;
use crate::transfer::TransferError;

pub mod download;
pub mod upload;

/// Build the full application router (shared by the binary and the tests)
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/fileUpload", upload::router())
        .nest("/fileDownload", download::router())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

impl IntoResponse for TransferError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, ApiResult::error(self.to_string())).into_response()
    }
}
