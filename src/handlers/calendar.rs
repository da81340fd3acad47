use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::auth::authenticate;
use crate::errors::AppError;
use crate::models::CalendarMonth;
use crate::services::calendar;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub year: i32,
    pub month: u32,
}

// GET /api/bookings/calendar
pub async fn month_view(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<CalendarMonth>, AppError> {
    let principal = authenticate(&state, &headers)?;
    Ok(Json(calendar::month_view(&state, &principal, query.year, query.month)?))
}
