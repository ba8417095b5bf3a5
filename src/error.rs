// src/error.rs

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::jobs::QueueError;
use crate::models::ErrorResponse;
use crate::pool::PoolError;

/// Outcome of a failed request. Each variant maps to exactly one status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    MethodNotAllowed(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    QueueFull(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::QueueFull(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn bad_request(context: &str, cause: impl fmt::Display) -> Self {
        ApiError::BadRequest(format!("{context}: {cause}"))
    }

    pub fn internal(context: &str, cause: impl fmt::Display) -> Self {
        ApiError::Internal(format!("{context}: {cause}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            error!(status = status.as_u16(), %message, "request failed");
        } else {
            warn!(status = status.as_u16(), %message, "request rejected");
        }
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

impl From<PoolError> for ApiError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Protected(_) | PoolError::AlreadyInstantiated(_) => {
                ApiError::MethodNotAllowed(err.to_string())
            }
            PoolError::InvalidEncoding { .. } => ApiError::BadRequest(err.to_string()),
            PoolError::UnknownLabel(_) => ApiError::NotFound(err.to_string()),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Full { .. } => ApiError::QueueFull(err.to_string()),
            QueueError::Closed => ApiError::Internal(err.to_string()),
        }
    }
}

/// Collects every problem found while validating one input, instead of
/// stopping at the first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeError {
    context: String,
    errors: Vec<String>,
}

impl CompositeError {
    pub fn new(context: impl Into<String>) -> Self {
        Self { context: context.into(), errors: Vec::new() }
    }

    pub fn add(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn into_result(self) -> Result<(), CompositeError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for CompositeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [{}]", self.context, self.errors().join("; "))
    }
}

impl std::error::Error for CompositeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_lists_every_error() {
        let mut composite = CompositeError::new("invalid table");
        composite.add("row 1: bad");
        composite.add("row 2: worse");

        assert_eq!(composite.errors().len(), 2);
        assert_eq!(composite.to_string(), "invalid table: [row 1: bad; row 2: worse]");
        assert!(composite.into_result().is_err());
    }

    #[test]
    fn empty_composite_is_ok() {
        assert!(CompositeError::new("nothing").into_result().is_ok());
    }

    #[test]
    fn status_taxonomy() {
        assert_eq!(ApiError::MethodNotAllowed(String::new()).status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ApiError::UnsupportedMediaType(String::new()).status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(ApiError::NotFound(String::new()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::BadRequest(String::new()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::QueueFull(String::new()).status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiError::Internal(String::new()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
