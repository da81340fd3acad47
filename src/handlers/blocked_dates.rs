use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::auth::authenticate;
use super::{date_param, json_body};
use crate::errors::AppError;
use crate::models::{BlockedDate, CascadeReport};
use crate::services::{blocked_dates, local_now, require_admin};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

fn list_range(state: &AppState, query: &RangeQuery) -> Result<Vec<BlockedDate>, AppError> {
    let start = date_param(query.start.as_deref(), "start")?;
    let end = date_param(query.end.as_deref(), "end")?;
    blocked_dates::list_blocked_dates(state, start, end)
}

// GET /api/blocked-dates
pub async fn list_public(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<BlockedDate>>, AppError> {
    authenticate(&state, &headers)?;
    Ok(Json(list_range(&state, &query)?))
}

// GET /api/admin/blocked-dates
pub async fn list_admin(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<BlockedDate>>, AppError> {
    let principal = authenticate(&state, &headers)?;
    require_admin(&principal)?;
    Ok(Json(list_range(&state, &query)?))
}

// POST /api/admin/blocked-dates
#[derive(Debug, Deserialize)]
pub struct BlockDateBody {
    pub date: String,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn block_date(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<BlockDateBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CascadeReport>), AppError> {
    let principal = authenticate(&state, &headers)?;
    let body = json_body(payload)?;
    let date = date_param(Some(&body.date), "date")?.ok_or_else(|| AppError::validation("date is required"))?;
    let report = blocked_dates::block_date(&state, &principal, date, body.reason.as_deref(), local_now())?;
    Ok((StatusCode::CREATED, Json(report)))
}

// DELETE /api/admin/blocked-dates/:date
pub async fn unblock_date(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(raw): Path<String>,
) -> Result<StatusCode, AppError> {
    let principal = authenticate(&state, &headers)?;
    let date = date_param(Some(&raw), "date")?.ok_or_else(|| AppError::validation("date is required"))?;
    blocked_dates::unblock_date(&state, &principal, date)?;
    Ok(StatusCode::NO_CONTENT)
}
