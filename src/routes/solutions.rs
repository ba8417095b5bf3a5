// src/routes/solutions.rs

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};

use super::{
    body_text, json_response, max_age, no_scenario, require_content_type, success, text_response,
    CSV_MIME,
};
use crate::error::ApiError;
use crate::models::MessageResponse;
use crate::AppState;

pub async fn get_solution_set(State(state): State<AppState>) -> Result<Response, ApiError> {
    let guard = state.session.lock().await;
    let session = guard.as_ref().ok_or_else(no_scenario)?;
    let set = session
        .solution_set()
        .ok_or_else(|| ApiError::NotFound("no solution set has been loaded".to_string()))?;
    Ok(text_response(CSV_MIME, &max_age(state.cache_max_age), set.raw().to_string()))
}

pub async fn post_solution_set(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    require_content_type(&headers, CSV_MIME)?;
    let text = body_text(&body)?;
    let mut guard = state.session.lock().await;
    let session = guard.as_mut().ok_or_else(no_scenario)?;

    session
        .load_solution_set(text)
        .map_err(|err| ApiError::bad_request("solution set rejected", err))?;
    let rows = session.solution_set().map(|set| set.rows().len()).unwrap_or_default();
    Ok(success(format!("solution set loaded ({rows} solutions)")))
}

/// Only rows of the loaded solution set are served, each materialised on
/// first request. Models in the pool are reached through `/models/{label}`.
pub async fn get_solution(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> Result<Response, ApiError> {
    let mut guard = state.session.lock().await;
    let session = guard.as_mut().ok_or_else(no_scenario)?;
    let solution = session
        .solution(&label)?
        .ok_or_else(|| ApiError::NotFound(format!("no solution labelled [{label}]")))?;
    Ok(json_response(StatusCode::OK, &max_age(state.cache_max_age), solution))
}
