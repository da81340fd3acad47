use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::auth::authenticate;
use super::{date_param, json_body, optional_json_body, ReasonBody};
use crate::errors::AppError;
use crate::models::{Booking, BookingFilter, BookingStatus};
use crate::services::admission::{self, BookingRequest};
use crate::services::reschedule::{self, MoveRequest};
use crate::services::{lifecycle, local_now};
use crate::state::AppState;

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let principal = authenticate(&state, &headers)?;
    let req = json_body(payload)?;
    let booking = admission::create_booking(&state, &principal, &req, local_now())?;
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings
#[derive(Debug, Deserialize)]
pub struct BookingsQuery {
    pub date: Option<String>,
    pub status: Option<String>,
    pub dog_id: Option<i64>,
    pub user_id: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let principal = authenticate(&state, &headers)?;

    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            BookingStatus::parse(raw).ok_or_else(|| AppError::validation(format!("unknown status: {raw}")))?,
        ),
    };
    let filter = BookingFilter {
        user_id: query.user_id,
        dog_id: query.dog_id,
        date: date_param(query.date.as_deref(), "date")?,
        status,
        limit: query.limit.unwrap_or(0),
    };

    Ok(Json(lifecycle::list_bookings(&state, &principal, filter)?))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Booking>, AppError> {
    let principal = authenticate(&state, &headers)?;
    Ok(Json(lifecycle::get_booking(&state, &principal, id)?))
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    payload: Result<Json<ReasonBody>, JsonRejection>,
) -> Result<Json<Booking>, AppError> {
    let principal = authenticate(&state, &headers)?;
    let body = optional_json_body(payload)?;
    let booking = lifecycle::cancel_booking(&state, &principal, id, body.reason.as_deref(), local_now())?;
    Ok(Json(booking))
}

// POST /api/bookings/:id/notes
#[derive(Debug, Deserialize)]
pub struct NotesBody {
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn add_notes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    payload: Result<Json<NotesBody>, JsonRejection>,
) -> Result<Json<Booking>, AppError> {
    let principal = authenticate(&state, &headers)?;
    let body = json_body(payload)?;
    let booking = lifecycle::add_notes(&state, &principal, id, body.notes.as_deref(), local_now())?;
    Ok(Json(booking))
}

// POST /api/bookings/:id/move
pub async fn move_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    payload: Result<Json<MoveRequest>, JsonRejection>,
) -> Result<Json<Booking>, AppError> {
    let principal = authenticate(&state, &headers)?;
    let req = json_body(payload)?;
    let booking = reschedule::move_booking(&state, &principal, id, &req, local_now())?;
    Ok(Json(booking))
}
