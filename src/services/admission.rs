use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::format::{fmt_date, hhmm};
use crate::models::{Booking, ExperienceLevel, NewBooking, Principal};
use crate::services::conflict::{check_double_booking, classify_write_error, slot_taken};
use crate::services::notifier::NotificationKind;
use crate::services::time_window;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub dog_id: i64,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub scheduled_time: NaiveTime,
}

pub fn check_not_past(date: &NaiveDate, today: &NaiveDate) -> Result<(), AppError> {
    if date < today {
        return Err(AppError::validation("cannot book a walk on a past date"));
    }
    Ok(())
}

/// Shared with the move engine so both report the same error for a closed day.
pub fn check_not_blocked(conn: &rusqlite::Connection, date: &NaiveDate) -> Result<(), AppError> {
    if let Some(blocked) = queries::get_blocked_date(conn, date)? {
        return Err(AppError::validation(format!(
            "{} is blocked for walks: {}",
            fmt_date(date),
            blocked.reason
        )));
    }
    Ok(())
}

/// Run every admission check in order, stopping at the first failure, then persist.
pub fn create_booking(
    state: &AppState,
    principal: &Principal,
    req: &BookingRequest,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let today = now.date();

    let user = {
        let db = state.db()?;
        queries::get_user(&db, principal.user_id)?
    }
    .ok_or_else(|| AppError::forbidden("user account not found"))?;
    if !user.is_active {
        return Err(AppError::forbidden("user account is inactive"));
    }

    let dog = {
        let db = state.db()?;
        queries::get_dog(&db, req.dog_id)?
    }
    .ok_or_else(|| AppError::not_found(format!("dog {}", req.dog_id)))?;
    if !dog.is_available {
        return Err(AppError::validation(format!(
            "{} is not available for walks",
            dog.name
        )));
    }

    if !ExperienceLevel::can_walk(&user.experience_level, &dog.category) {
        return Err(AppError::forbidden(format!(
            "experience level '{}' cannot walk {} ({} category)",
            user.experience_level, dog.name, dog.category
        )));
    }

    let settings = {
        let db = state.db()?;
        queries::load_booking_settings(&db)?
    };

    check_not_past(&req.date, &today)?;
    let horizon = Duration::try_days(settings.booking_advance_days)
        .and_then(|window| today.checked_add_signed(window))
        .unwrap_or(NaiveDate::MAX);
    if req.date > horizon {
        return Err(AppError::validation(format!(
            "walks can be booked at most {} days in advance",
            settings.booking_advance_days
        )));
    }

    let requires_approval = {
        let db = state.db()?;
        check_not_blocked(&db, &req.date)?;
        let verdict = time_window::evaluate(&db, &req.date, &req.scheduled_time, &settings)?;
        time_window::admit(&verdict, &req.scheduled_time)?
    };

    {
        let db = state.db()?;
        if check_double_booking(&db, req.dog_id, &req.date, &req.scheduled_time, None)? {
            return Err(slot_taken(req.dog_id, &req.date, &req.scheduled_time));
        }
    }

    let new = NewBooking {
        user_id: user.id,
        dog_id: dog.id,
        date: req.date,
        scheduled_time: req.scheduled_time,
        requires_approval,
    };

    let db = state.db()?;
    let id = queries::insert_booking(&db, &new, &now)
        .map_err(|e| classify_write_error(e, new.dog_id, &new.date, &new.scheduled_time))?;
    let booking = queries::get_booking_by_id(&db, id)?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("booking {id} vanished after insert")))?;

    tracing::info!(
        booking_id = booking.id,
        user_id = user.id,
        dog_id = dog.id,
        date = %booking.date,
        requires_approval,
        "booking created"
    );

    if let Err(e) = queries::touch_user_activity(&db, user.id, &now) {
        tracing::warn!(user_id = user.id, error = %e, "failed to record user activity");
    }
    state.notifier.notify_quietly(
        &db,
        &booking,
        NotificationKind::BookingConfirmation { requires_approval },
    );

    Ok(booking)
}
