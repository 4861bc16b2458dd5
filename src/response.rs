//! Uniform API result envelope
//!
//! Every JSON-style operation answers with the same shape: a success flag,
//! a result code, a human-readable message and an optional key-value
//! payload. Built through named factories, not a mutable builder.

use std::collections::HashMap;

use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::Value;

/// Result code for a successful operation
pub const CODE_SUCCESS: u32 = 20000;

/// Result code for a failed operation
pub const CODE_FAILURE: u32 = 20001;

/// The envelope wrapped around every JSON operation result.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResult {
    pub success: bool,
    pub code: u32,
    pub message: String,
    pub data: HashMap<String, Value>,
}

impl ApiResult {
    /// A successful result
    pub fn ok() -> Self {
        Self {
            success: true,
            code: CODE_SUCCESS,
            message: "success".to_string(),
            data: HashMap::new(),
        }
    }

    /// A failed result with a descriptive message
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: CODE_FAILURE,
            message: message.into(),
            data: HashMap::new(),
        }
    }

    /// Attach a payload entry
    pub fn data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

impl IntoResponse for ApiResult {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
