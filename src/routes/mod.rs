// src/routes/mod.rs

use axum::{
    body::Bytes,
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE},
        HeaderMap, Method, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::ApiError;
use crate::models::MessageResponse;

pub mod admin;
pub mod jobs;
pub mod model;
pub mod models;
pub mod scenario;
pub mod solutions;


pub const JSON_MIME: &str = "application/json";
pub const TOML_MIME: &str = "application/toml";
pub const CSV_MIME: &str = "text/csv";

pub const PUBLIC: &str = "public";

pub fn max_age(seconds: u64) -> String {
    format!("max-age={seconds}")
}

/// Compares the media type of the request, ignoring parameters such as
/// `charset`.
pub fn require_content_type(headers: &HeaderMap, expected: &str) -> Result<(), ApiError> {
    let found = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let essence = found.split(';').next().unwrap_or_default().trim();
    if essence.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(ApiError::UnsupportedMediaType(format!(
            "expected Content-Type [{expected}], found [{found}]"
        )))
    }
}

pub fn body_text(body: &Bytes) -> Result<&str, ApiError> {
    std::str::from_utf8(body).map_err(|err| ApiError::bad_request("request body is not UTF-8", err))
}

pub fn json_response<T: Serialize>(status: StatusCode, cache_control: &str, body: &T) -> Response {
    (status, [(CACHE_CONTROL, cache_control.to_string())], Json(body)).into_response()
}

pub fn text_response(content_type: &str, cache_control: &str, body: String) -> Response {
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, content_type.to_string()),
            (CACHE_CONTROL, cache_control.to_string()),
        ],
        body,
    )
        .into_response()
}

pub fn success(message: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse::success(message))
}

pub fn no_scenario() -> ApiError {
    ApiError::NotFound("no scenario has been loaded".to_string())
}

// Fallbacks
pub async fn method_not_allowed(method: Method, uri: Uri) -> ApiError {
    ApiError::MethodNotAllowed(format!("method {method} is not allowed on {}", uri.path()))
}

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("no resource at {}", uri.path()))
}
