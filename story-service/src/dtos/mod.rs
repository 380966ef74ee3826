use axum::{Json, http::StatusCode, response::IntoResponse, response::Response};
use serde::Serialize;

/// Envelope for successful API responses: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct Success<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> Success<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for Success<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}
