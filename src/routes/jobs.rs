// src/routes/jobs.rs

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use tracing::info;
use uuid::Uuid;

use super::{body_text, json_response, max_age, require_content_type, text_response, PUBLIC, TOML_MIME};
use crate::error::ApiError;
use crate::jobs::Job;
use crate::AppState;

fn job_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::NotFound(format!("no job [{id}]")))
}

async fn find_job(state: &AppState, id: &str) -> Result<Job, ApiError> {
    let id = job_id(id)?;
    state
        .jobs
        .get(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("no job [{id}]")))
}

/// Queues a scenario run. Invalid configurations are recorded in history
/// and reported without ever reaching the queue.
pub async fn create_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    require_content_type(&headers, TOML_MIME)?;
    let text = body_text(&body)?;

    let mut job = Job::new(text);
    let id = job.id;
    if let Err(err) = job.parse_configuration() {
        state.jobs.add(job).await;
        return Err(ApiError::internal(&format!("job [{id}] is invalid"), err));
    }

    state.jobs.add(job.clone()).await;
    if let Err(err) = state.queue.enqueue(id) {
        state.jobs.remove(id).await;
        return Err(err.into());
    }
    info!(job = %id, capacity = state.queue.capacity(), "job queued");
    Ok(json_response(StatusCode::CREATED, "no-cache", &job))
}

pub async fn list_jobs(State(state): State<AppState>) -> Response {
    let jobs = state.jobs.list().await;
    json_response(StatusCode::OK, &max_age(state.cache_max_age), &jobs)
}

/// Removes completed and invalid jobs and returns them.
pub async fn purge_jobs(State(state): State<AppState>) -> Response {
    let purged = state.jobs.purge_processed().await;
    json_response(StatusCode::OK, "no-cache", &purged)
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let job = find_job(&state, &id).await?;
    Ok(json_response(StatusCode::OK, &max_age(state.cache_max_age), &job))
}

pub async fn get_job_scenario(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let job = find_job(&state, &id).await?;
    Ok(text_response(TOML_MIME, PUBLIC, job.scenario_text().to_string()))
}
