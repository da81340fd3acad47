use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::auth::authenticate;
use super::json_body;
use crate::errors::AppError;
use crate::models::{BookingTimeRule, DayType, RuleDraft, SystemSetting};
use crate::services::sweeper::{self, SweepReport};
use crate::services::{local_now, require_admin, rules};
use crate::state::AppState;

// GET /api/admin/time-rules
#[derive(Debug, Deserialize)]
pub struct RulesQuery {
    pub day_type: Option<String>,
}

pub async fn list_rules(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RulesQuery>,
) -> Result<Json<Vec<BookingTimeRule>>, AppError> {
    let principal = authenticate(&state, &headers)?;
    require_admin(&principal)?;

    let day_type = match query.day_type.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            DayType::parse(raw).ok_or_else(|| AppError::validation(format!("unknown day_type: {raw}")))?,
        ),
    };
    Ok(Json(rules::list_rules(&state, day_type)?))
}

// POST /api/admin/time-rules
pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<RuleDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingTimeRule>), AppError> {
    let principal = authenticate(&state, &headers)?;
    let draft = json_body(payload)?;
    let rule = rules::create_rule(&state, &principal, &draft)?;
    Ok((StatusCode::CREATED, Json(rule)))
}

// PUT /api/admin/time-rules/:id
pub async fn update_rule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    payload: Result<Json<RuleDraft>, JsonRejection>,
) -> Result<Json<BookingTimeRule>, AppError> {
    let principal = authenticate(&state, &headers)?;
    let draft = json_body(payload)?;
    Ok(Json(rules::update_rule(&state, &principal, id, &draft)?))
}

// DELETE /api/admin/time-rules/:id
pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let principal = authenticate(&state, &headers)?;
    rules::delete_rule(&state, &principal, id)?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/admin/settings
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<SystemSetting>>, AppError> {
    let principal = authenticate(&state, &headers)?;
    Ok(Json(rules::list_settings(&state, &principal)?))
}

// PUT /api/admin/settings/:key
#[derive(Debug, Deserialize)]
pub struct SettingBody {
    pub value: String,
}

pub async fn update_setting(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(key): Path<String>,
    payload: Result<Json<SettingBody>, JsonRejection>,
) -> Result<Json<SystemSetting>, AppError> {
    let principal = authenticate(&state, &headers)?;
    let body = json_body(payload)?;
    let setting = rules::update_setting(&state, &principal, &key, &body.value, local_now())?;
    Ok(Json(setting))
}

// POST /api/admin/sweep
pub async fn run_sweep(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SweepReport>, AppError> {
    let principal = authenticate(&state, &headers)?;
    require_admin(&principal)?;
    Ok(Json(sweeper::sweep(&state, local_now())?))
}
