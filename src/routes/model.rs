// src/routes/model.rs
//
// The Scratchpad model: its snapshot, its descriptive attributes, its active
// actions as a table, and per-subcatchment views.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use csv::{ReaderBuilder, Trim};
use serde_json::Value;
use tracing::warn;

use super::{
    body_text, json_response, max_age, no_scenario, require_content_type, success, CSV_MIME,
    JSON_MIME,
};
use crate::catchment::{CatchmentModel, ENCODING};
use crate::codec::{self, ActionStates};
use crate::error::{ApiError, CompositeError};
use crate::models::{ActiveActions, ApplicableActions, Attributes, MessageResponse, SubcatchmentDetail};
use crate::pool::SCRATCHPAD;
use crate::session::ScenarioSession;
use crate::AppState;

const SUBCATCHMENT_COLUMN: &str = "SubCatchment";
const ACTIVE: &str = "Active";
const INACTIVE: &str = "Inactive";

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn scratchpad(session: &ScenarioSession) -> Result<&CatchmentModel, ApiError> {
    session
        .pool()
        .model(SCRATCHPAD)
        .ok_or_else(|| ApiError::NotFound("no scratchpad model".to_string()))
}

fn scratchpad_mut(session: &mut ScenarioSession) -> Result<&mut CatchmentModel, ApiError> {
    session
        .pool_mut()
        .model_mut(SCRATCHPAD)
        .ok_or_else(|| ApiError::NotFound("no scratchpad model".to_string()))
}

fn refresh_scratchpad(session: &mut ScenarioSession) -> Result<(), ApiError> {
    session
        .refresh(SCRATCHPAD)
        .map_err(|err| ApiError::internal("unable to refresh scratchpad", err))
}

fn parse_attributes(body: &Bytes) -> Result<Attributes, ApiError> {
    serde_json::from_slice(body).map_err(|err| ApiError::bad_request("invalid attribute list", err))
}

/// Looks up a planning unit from the path. Ids that are not numbers are as
/// unknown as numbers the model lacks.
fn planning_unit(model: &CatchmentModel, id: &str) -> Result<u32, ApiError> {
    id.parse::<u32>()
        .ok()
        .filter(|unit| model.has_planning_unit(*unit))
        .ok_or_else(|| ApiError::NotFound(format!("no subcatchment [{id}]")))
}

/// Applies the table's cells over the model's current flags. Actions the
/// table does not mention keep their state; cells naming an action the
/// subcatchment lacks are ignored.
fn parse_active_actions(text: &str, model: &CatchmentModel) -> Result<Vec<bool>, ApiError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(Trim::All)
        .from_reader(text.as_bytes());
    let bad_table = |err: csv::Error| ApiError::bad_request("unable to read active actions", err);

    let headers = reader.headers().map_err(bad_table)?.clone();
    let mut errors = CompositeError::new("invalid active actions table");
    let first = headers.get(0).unwrap_or_default();
    if first != SUBCATCHMENT_COLUMN {
        errors.add(format!("first column must be [{SUBCATCHMENT_COLUMN}], found [{first}]"));
        return Err(ApiError::BadRequest(errors.to_string()));
    }

    let actions = model.management_actions();
    let mut flags = model.action_flags();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(bad_table)?;
        let row = index + 1;

        let cell = record.get(0).unwrap_or_default();
        let unit = match cell.parse::<u32>() {
            Ok(unit) if model.has_planning_unit(unit) => unit,
            Ok(unit) => {
                errors.add(format!("row {row}: unknown subcatchment [{unit}]"));
                continue;
            }
            Err(_) => {
                errors.add(format!("row {row}: [{cell}] is not a subcatchment id"));
                continue;
            }
        };

        for (column, action_type) in headers.iter().enumerate().skip(1) {
            let active = match record.get(column).unwrap_or_default() {
                "0" => false,
                "1" => true,
                other => {
                    errors.add(format!("row {row} column [{action_type}]: [{other}] is not 0 or 1"));
                    continue;
                }
            };
            let position = actions
                .iter()
                .position(|action| action.planning_unit == unit && action.action_type == action_type);
            match position {
                Some(position) => flags[position] = active,
                None if active => warn!(
                    subcatchment = unit,
                    action_type, "ignoring activation of an action the subcatchment does not have"
                ),
                None => {}
            }
        }
    }

    errors
        .into_result()
        .map_err(|errors| ApiError::BadRequest(errors.to_string()))?;
    Ok(flags)
}

// ─────────────────────────────────────────────────────────────────────────────
// /model
// ─────────────────────────────────────────────────────────────────────────────

pub async fn get_model(State(state): State<AppState>) -> Result<Response, ApiError> {
    let guard = state.session.lock().await;
    let session = guard.as_ref().ok_or_else(no_scenario)?;
    let solution = session
        .pool()
        .solution(SCRATCHPAD)
        .ok_or_else(|| ApiError::NotFound("no scratchpad model".to_string()))?;
    Ok(json_response(StatusCode::OK, &max_age(state.cache_max_age), solution))
}

/// Sets descriptive attributes on the scratchpad. An `Encoding` attribute is
/// decoded onto its actions instead of being stored verbatim.
pub async fn patch_model(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    require_content_type(&headers, JSON_MIME)?;
    let mut guard = state.session.lock().await;
    let session = guard.as_mut().ok_or_else(no_scenario)?;
    let mut attributes = parse_attributes(&body)?;

    let model = scratchpad_mut(session)?;
    if let Some(encoding) = attributes.remove(ENCODING) {
        let token = encoding
            .as_str()
            .ok_or_else(|| ApiError::BadRequest(format!("{ENCODING} must be a string")))?;
        codec::decode(token, model)
            .map_err(|err| ApiError::bad_request(&format!("invalid {ENCODING} [{token}]"), err))?;
    }
    let updated = attributes.len();
    for pair in attributes.iter() {
        model.attributes_mut().set(pair.name.clone(), pair.value.clone());
    }

    refresh_scratchpad(session)?;
    Ok(success(format!("model updated ({updated} attribute(s))")))
}

// ─────────────────────────────────────────────────────────────────────────────
// /model/actions/active
// ─────────────────────────────────────────────────────────────────────────────

pub async fn get_active_actions(State(state): State<AppState>) -> Result<Response, ApiError> {
    let guard = state.session.lock().await;
    let session = guard.as_ref().ok_or_else(no_scenario)?;
    let solution = session
        .pool()
        .solution(SCRATCHPAD)
        .ok_or_else(|| ApiError::NotFound("no scratchpad model".to_string()))?;
    let active = ActiveActions {
        active_management_actions: solution.active_management_actions.clone(),
    };
    Ok(json_response(StatusCode::OK, &max_age(state.cache_max_age), &active))
}

pub async fn put_active_actions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    require_content_type(&headers, CSV_MIME)?;
    let text = body_text(&body)?;
    let mut guard = state.session.lock().await;
    let session = guard.as_mut().ok_or_else(no_scenario)?;

    let flags = parse_active_actions(text, scratchpad(session)?)?;
    scratchpad_mut(session)?.apply_action_flags(&flags);
    refresh_scratchpad(session)?;

    let active = flags.iter().filter(|active| **active).count();
    Ok(success(format!("active management actions updated ({active} active)")))
}

// ─────────────────────────────────────────────────────────────────────────────
// /model/subcatchment/{id}
// ─────────────────────────────────────────────────────────────────────────────

pub async fn get_subcatchment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let guard = state.session.lock().await;
    let session = guard.as_ref().ok_or_else(no_scenario)?;
    let model = scratchpad(session)?;
    let unit = planning_unit(model, &id)?;

    let mut attributes = Attributes::default();
    for action in model.actions_at(unit) {
        attributes.set(action.action_type.clone(), if action.active { ACTIVE } else { INACTIVE });
    }
    let detail = SubcatchmentDetail { id: unit, attributes };
    Ok(json_response(StatusCode::OK, &max_age(state.cache_max_age), &detail))
}

/// Sets actions of one subcatchment from `{ActionType: "Active"|"Inactive"}`
/// attributes. Nothing changes unless every attribute is valid.
pub async fn post_subcatchment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    require_content_type(&headers, JSON_MIME)?;
    let mut guard = state.session.lock().await;
    let session = guard.as_mut().ok_or_else(no_scenario)?;
    let unit = planning_unit(scratchpad(session)?, &id)?;
    let attributes = parse_attributes(&body)?;

    let model = scratchpad_mut(session)?;
    let mut errors = CompositeError::new(format!("invalid actions for subcatchment [{unit}]"));
    let mut changes = Vec::with_capacity(attributes.len());
    for pair in attributes.iter() {
        let active = match &pair.value {
            Value::String(value) if value == ACTIVE => true,
            Value::String(value) if value == INACTIVE => false,
            Value::Bool(value) => *value,
            other => {
                errors.add(format!("[{}]: [{other}] is neither {ACTIVE} nor {INACTIVE}", pair.name));
                continue;
            }
        };
        if model.actions_at(unit).any(|action| action.action_type == pair.name) {
            changes.push((pair.name.as_str(), active));
        } else {
            errors.add(format!("[{}] is not applicable to subcatchment [{unit}]", pair.name));
        }
    }
    errors
        .into_result()
        .map_err(|errors| ApiError::BadRequest(errors.to_string()))?;

    for (action_type, active) in &changes {
        model
            .set_planning_unit_action(unit, action_type, *active)
            .map_err(|err| ApiError::bad_request("unable to set action", err))?;
    }
    refresh_scratchpad(session)?;
    Ok(success(format!("subcatchment [{unit}] updated ({} action(s))", changes.len())))
}

pub async fn get_applicable_actions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let guard = state.session.lock().await;
    let session = guard.as_ref().ok_or_else(no_scenario)?;
    let model = scratchpad(session)?;
    let unit = planning_unit(model, &id)?;

    let applicable = ApplicableActions {
        applicable_actions: model.actions_at(unit).map(|action| action.action_type.clone()).collect(),
    };
    Ok(json_response(StatusCode::OK, &max_age(state.cache_max_age), &applicable))
}
