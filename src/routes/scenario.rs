// src/routes/scenario.rs

use axum::{body::Bytes, extract::State, http::HeaderMap, response::Response, Json};

use super::{body_text, max_age, no_scenario, require_content_type, success, text_response, TOML_MIME};
use crate::error::ApiError;
use crate::models::MessageResponse;
use crate::session::ScenarioSession;
use crate::AppState;

pub async fn get_scenario(State(state): State<AppState>) -> Result<Response, ApiError> {
    let guard = state.session.lock().await;
    let session = guard.as_ref().ok_or_else(no_scenario)?;
    Ok(text_response(TOML_MIME, &max_age(state.cache_max_age), session.text().to_string()))
}

/// Replaces the loaded scenario, discarding every derived model and any
/// solution set.
pub async fn post_scenario(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    require_content_type(&headers, TOML_MIME)?;
    let text = body_text(&body)?;
    let session =
        ScenarioSession::load(text).map_err(|err| ApiError::bad_request("unable to load scenario", err))?;

    let name = session.config().scenario.name.clone();
    *state.session.lock().await = Some(session);
    Ok(success(format!("scenario [{name}] loaded")))
}
