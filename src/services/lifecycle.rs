use chrono::NaiveDateTime;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingFilter, Principal};
use crate::services::notifier::NotificationKind;
use crate::services::required_text;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 100;
const MAX_LIST_LIMIT: i64 = 500;

/// Owners see their own bookings; administrators see any.
pub fn get_booking(state: &AppState, principal: &Principal, booking_id: i64) -> Result<Booking, AppError> {
    let booking = {
        let db = state.db()?;
        queries::get_booking_by_id(&db, booking_id)?
    }
    .ok_or_else(|| AppError::not_found(format!("booking {booking_id}")))?;

    if !principal.is_admin && !principal.owns(booking.user_id) {
        return Err(AppError::forbidden("you can only view your own bookings"));
    }
    Ok(booking)
}

pub fn list_bookings(
    state: &AppState,
    principal: &Principal,
    mut filter: BookingFilter,
) -> Result<Vec<Booking>, AppError> {
    if !principal.is_admin {
        filter.user_id = Some(principal.user_id);
    }
    filter.limit = match filter.limit {
        n if n <= 0 => DEFAULT_LIST_LIMIT,
        n => n.min(MAX_LIST_LIMIT),
    };

    let db = state.db()?;
    Ok(queries::list_bookings(&db, &filter)?)
}

/// Owners may cancel only with enough notice. Administrators may always cancel but
/// must say why.
pub fn cancel_booking(
    state: &AppState,
    principal: &Principal,
    booking_id: i64,
    reason: Option<&str>,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let booking = get_booking(state, principal, booking_id)?;
    if booking.status.is_terminal() {
        return Err(AppError::validation(format!(
            "only scheduled bookings can be cancelled (booking is {})",
            booking.status.as_str()
        )));
    }

    let db = state.db()?;
    let admin_reason = if principal.is_admin {
        Some(required_text(reason, "cancellation reason")?)
    } else {
        let settings = queries::load_booking_settings(&db)?;
        let lead = booking.starts_at() - now;
        let notice_minutes = settings
            .cancellation_notice_hours
            .checked_mul(60)
            .unwrap_or(i64::MAX);
        if lead.num_minutes() < notice_minutes {
            return Err(AppError::validation(format!(
                "walks must be cancelled at least {} hours before they start",
                settings.cancellation_notice_hours
            )));
        }
        None
    };

    if !queries::cancel_booking(&db, booking_id, admin_reason.as_deref(), &now)? {
        return Err(AppError::validation("booking is no longer scheduled"));
    }
    let cancelled = queries::get_booking_by_id(&db, booking_id)?
        .ok_or_else(|| AppError::not_found(format!("booking {booking_id}")))?;

    tracing::info!(
        booking_id,
        by = principal.user_id,
        admin = principal.is_admin,
        "booking cancelled"
    );
    let kind = match admin_reason {
        Some(reason) => NotificationKind::AdminCancellation { reason },
        None => NotificationKind::BookingCancelled,
    };
    state.notifier.notify_quietly(&db, &cancelled, kind);

    Ok(cancelled)
}

/// Walk notes belong to the walker and can only be written once the walk happened.
pub fn add_notes(
    state: &AppState,
    principal: &Principal,
    booking_id: i64,
    notes: Option<&str>,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let notes = required_text(notes, "notes")?;
    let booking = {
        let db = state.db()?;
        queries::get_booking_by_id(&db, booking_id)?
    }
    .ok_or_else(|| AppError::not_found(format!("booking {booking_id}")))?;

    if !principal.owns(booking.user_id) {
        return Err(AppError::forbidden("you can only add notes to your own walks"));
    }

    let db = state.db()?;
    if !queries::set_user_notes(&db, booking_id, &notes, &now)? {
        return Err(AppError::validation(format!(
            "notes can only be added to completed walks (booking is {})",
            booking.status.as_str()
        )));
    }
    queries::get_booking_by_id(&db, booking_id)?
        .ok_or_else(|| AppError::not_found(format!("booking {booking_id}")))
}
