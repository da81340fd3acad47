use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use super::auth::authenticate;
use super::{optional_json_body, ReasonBody};
use crate::errors::AppError;
use crate::models::Booking;
use crate::services::{approval, local_now};
use crate::state::AppState;

// GET /api/admin/bookings/pending
pub async fn list_pending(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Booking>>, AppError> {
    let principal = authenticate(&state, &headers)?;
    Ok(Json(approval::list_pending(&state, &principal)?))
}

// POST /api/admin/bookings/:id/approve
pub async fn approve(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Booking>, AppError> {
    let principal = authenticate(&state, &headers)?;
    Ok(Json(approval::approve(&state, &principal, id, local_now())?))
}

// POST /api/admin/bookings/:id/reject
pub async fn reject(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    payload: Result<Json<ReasonBody>, JsonRejection>,
) -> Result<Json<Booking>, AppError> {
    let principal = authenticate(&state, &headers)?;
    let body = optional_json_body(payload)?;
    let booking = approval::reject(&state, &principal, id, body.reason.as_deref(), local_now())?;
    Ok(Json(booking))
}
