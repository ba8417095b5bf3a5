// src/routes/models.rs

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};

use super::{json_response, max_age, no_scenario, require_content_type, success, JSON_MIME};
use crate::catchment::{ENCODING, SUMMARY};
use crate::error::ApiError;
use crate::models::{Attributes, MessageResponse};
use crate::pool::{AS_IS, SCRATCHPAD};
use crate::AppState;

pub async fn get_model(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> Result<Response, ApiError> {
    let guard = state.session.lock().await;
    let session = guard.as_ref().ok_or_else(no_scenario)?;
    let solution = session
        .pool()
        .solution(&label)
        .ok_or_else(|| ApiError::NotFound(format!("no model labelled [{label}]")))?;
    Ok(json_response(StatusCode::OK, &max_age(state.cache_max_age), solution))
}

/// Instantiates a labelled copy of As-Is from an `Encoding` token. Label
/// checks come before the body is looked at.
pub async fn post_model(
    State(state): State<AppState>,
    Path(label): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut guard = state.session.lock().await;
    let session = guard.as_mut().ok_or_else(no_scenario)?;

    if label == AS_IS {
        return Err(ApiError::MethodNotAllowed(format!("model [{AS_IS}] cannot be re-instantiated")));
    }
    if label != SCRATCHPAD && session.pool().has_model(&label) {
        return Err(ApiError::MethodNotAllowed(format!("model [{label}] already exists")));
    }
    require_content_type(&headers, JSON_MIME)?;

    let attributes: Attributes = serde_json::from_slice(&body)
        .map_err(|err| ApiError::bad_request("invalid attribute list", err))?;
    let encoding = attributes
        .get_str(ENCODING)
        .ok_or_else(|| ApiError::BadRequest(format!("a string {ENCODING} attribute is required")))?;
    let summary = match attributes.get(SUMMARY) {
        None => "",
        Some(value) => value
            .as_str()
            .ok_or_else(|| ApiError::BadRequest(format!("{SUMMARY} must be a string")))?,
    };

    let solution = session.instantiate(&label, encoding, summary)?;
    let token = solution.encoded_actions.clone();
    Ok(success(format!("model [{label}] instantiated from [{token}]")))
}
