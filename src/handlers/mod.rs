pub mod admin;
pub mod approvals;
pub mod auth;
pub mod blocked_dates;
pub mod bookings;
pub mod calendar;
pub mod health;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::format::parse_date;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/bookings",
            post(bookings::create_booking).get(bookings::list_bookings),
        )
        .route("/api/bookings/calendar", get(calendar::month_view))
        .route("/api/bookings/:id", get(bookings::get_booking))
        .route("/api/bookings/:id/cancel", post(bookings::cancel_booking))
        .route("/api/bookings/:id/notes", post(bookings::add_notes))
        .route("/api/bookings/:id/move", post(bookings::move_booking))
        .route("/api/blocked-dates", get(blocked_dates::list_public))
        .route("/api/admin/bookings/pending", get(approvals::list_pending))
        .route("/api/admin/bookings/:id/approve", post(approvals::approve))
        .route("/api/admin/bookings/:id/reject", post(approvals::reject))
        .route(
            "/api/admin/blocked-dates",
            get(blocked_dates::list_admin).post(blocked_dates::block_date),
        )
        .route(
            "/api/admin/blocked-dates/:date",
            axum::routing::delete(blocked_dates::unblock_date),
        )
        .route(
            "/api/admin/time-rules",
            get(admin::list_rules).post(admin::create_rule),
        )
        .route(
            "/api/admin/time-rules/:id",
            put(admin::update_rule).delete(admin::delete_rule),
        )
        .route("/api/admin/settings", get(admin::get_settings))
        .route("/api/admin/settings/:key", put(admin::update_setting))
        .route("/api/admin/sweep", post(admin::run_sweep))
        .with_state(state)
}

/// Unwrap a JSON body, turning axum's rejection into a 400 with its explanation.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

/// Like [`json_body`] for endpoints whose body may be left out entirely. A request
/// without a JSON content type gets the default; a malformed body is still a 400.
pub(crate) fn optional_json_body<T: Default>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        other => json_body(other),
    }
}

pub(crate) fn date_param(raw: Option<&str>, field: &str) -> Result<Option<NaiveDate>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_date(s)
            .map(Some)
            .ok_or_else(|| AppError::validation(format!("{field} must be a date in YYYY-MM-DD format"))),
    }
}

/// Body for endpoints that take an optional free-text reason.
#[derive(Debug, Default, Deserialize)]
pub struct ReasonBody {
    #[serde(default)]
    pub reason: Option<String>,
}
