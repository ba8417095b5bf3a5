// src/routes/admin.rs

use axum::{extract::State, Json};

use super::success;
use crate::models::{MessageResponse, ServiceStatus};
use crate::service::Service;

pub async fn status(State(service): State<Service>) -> Json<ServiceStatus> {
    Json(service.status().await)
}

/// Replies first; the listeners drain in-flight requests before stopping.
pub async fn shutdown(State(service): State<Service>) -> Json<MessageResponse> {
    service.request_shutdown().await;
    success("service is shutting down")
}
