use chrono::NaiveDateTime;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, Principal};
use crate::services::notifier::NotificationKind;
use crate::services::{require_admin, required_text};
use crate::state::AppState;

pub fn list_pending(state: &AppState, principal: &Principal) -> Result<Vec<Booking>, AppError> {
    require_admin(principal)?;
    let db = state.db()?;
    Ok(queries::list_pending_bookings(&db)?)
}

pub fn approve(
    state: &AppState,
    principal: &Principal,
    booking_id: i64,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    require_admin(principal)?;

    let db = state.db()?;
    if !queries::approve_booking(&db, booking_id, principal.user_id, &now)? {
        return Err(explain_no_transition(&db, booking_id)?);
    }

    let booking = reload(&db, booking_id)?;
    tracing::info!(booking_id, reviewer = principal.user_id, "booking approved");
    state
        .notifier
        .notify_quietly(&db, &booking, NotificationKind::BookingApproved);
    Ok(booking)
}

/// Rejecting cancels the booking in the same update and records the reason on both
/// the review and the cancellation.
pub fn reject(
    state: &AppState,
    principal: &Principal,
    booking_id: i64,
    reason: Option<&str>,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    require_admin(principal)?;
    let reason = required_text(reason, "rejection reason")?;

    let db = state.db()?;
    if !queries::reject_booking(&db, booking_id, principal.user_id, &reason, &now)? {
        return Err(explain_no_transition(&db, booking_id)?);
    }

    let booking = reload(&db, booking_id)?;
    tracing::info!(booking_id, reviewer = principal.user_id, reason = %reason, "booking rejected");
    state
        .notifier
        .notify_quietly(&db, &booking, NotificationKind::BookingRejected { reason });
    Ok(booking)
}

/// The conditional update cannot tell "missing" from "already decided"; re-read to say which.
fn explain_no_transition(conn: &rusqlite::Connection, booking_id: i64) -> Result<AppError, AppError> {
    Ok(match queries::get_booking_by_id(conn, booking_id)? {
        None => AppError::not_found(format!("booking {booking_id}")),
        Some(b) if !b.is_scheduled() => AppError::conflict(format!(
            "booking {booking_id} is {} and can no longer be reviewed",
            b.status.as_str()
        )),
        Some(b) => AppError::conflict(format!(
            "booking {booking_id} has already been reviewed ({})",
            b.approval_status.as_str()
        )),
    })
}

fn reload(conn: &rusqlite::Connection, booking_id: i64) -> Result<Booking, AppError> {
    queries::get_booking_by_id(conn, booking_id)?
        .ok_or_else(|| AppError::not_found(format!("booking {booking_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::parse_time;
    use crate::models::{ApprovalStatus, BookingStatus};
    use crate::services::admission::{create_booking, BookingRequest};
    use crate::services::test_support::{drain, dt, seed_dog, seed_user, test_state};
    use axum::http::StatusCode;
    use chrono::NaiveDate;

    const NOW: &str = "2025-06-13 08:00";

    fn pending_booking(state: &AppState) -> (Principal, Booking) {
        let user = seed_user(state, "Una", "green", false);
        let dog = seed_dog(state, "Rex", "green");
        let req = BookingRequest {
            dog_id: dog,
            date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            scheduled_time: parse_time("09:00").unwrap(),
        };
        let booking = create_booking(state, &user, &req, dt(NOW)).unwrap();
        assert_eq!(booking.approval_status, ApprovalStatus::Pending);
        (user, booking)
    }

    #[test]
    fn test_approve_pending() {
        let (state, mut rx) = test_state();
        let admin = seed_user(&state, "Ada", "orange", true);
        let (_, booking) = pending_booking(&state);
        drain(&mut rx);

        assert_eq!(list_pending(&state, &admin).unwrap().len(), 1);
        let approved = approve(&state, &admin, booking.id, dt(NOW)).unwrap();
        assert_eq!(approved.approval_status, ApprovalStatus::Approved);
        assert_eq!(approved.approved_by, Some(admin.user_id));
        assert!(approved.approved_at.is_some());
        assert!(list_pending(&state, &admin).unwrap().is_empty());
        assert_eq!(drain(&mut rx)[0].kind, NotificationKind::BookingApproved);
    }

    #[test]
    fn test_second_review_is_conflict() {
        let (state, _rx) = test_state();
        let admin = seed_user(&state, "Ada", "orange", true);
        let (_, booking) = pending_booking(&state);

        approve(&state, &admin, booking.id, dt(NOW)).unwrap();
        let again = approve(&state, &admin, booking.id, dt(NOW)).unwrap_err();
        assert_eq!(again.status(), StatusCode::CONFLICT);
        let reject_after = reject(&state, &admin, booking.id, Some("late"), dt(NOW)).unwrap_err();
        assert_eq!(reject_after.status(), StatusCode::CONFLICT);

        // The approval was not overwritten.
        let db = state.db.lock().unwrap();
        let stored = queries::get_booking_by_id(&db, booking.id).unwrap().unwrap();
        assert_eq!(stored.approval_status, ApprovalStatus::Approved);
        assert_eq!(stored.status, BookingStatus::Scheduled);
    }

    #[test]
    fn test_reject_cancels_and_records_reason() {
        let (state, _rx) = test_state();
        let admin = seed_user(&state, "Ada", "orange", true);
        let (_, booking) = pending_booking(&state);

        let rejected = reject(&state, &admin, booking.id, Some("  dog is unwell "), dt(NOW)).unwrap();
        assert_eq!(rejected.approval_status, ApprovalStatus::Rejected);
        assert_eq!(rejected.status, BookingStatus::Cancelled);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("dog is unwell"));
        assert_eq!(rejected.admin_cancellation_reason.as_deref(), Some("dog is unwell"));
    }

    #[test]
    fn test_reject_requires_reason() {
        let (state, _rx) = test_state();
        let admin = seed_user(&state, "Ada", "orange", true);
        let (_, booking) = pending_booking(&state);

        let err = reject(&state, &admin, booking.id, Some("   "), dt(NOW)).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let err = reject(&state, &admin, booking.id, None, dt(NOW)).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_booking_is_not_found() {
        let (state, _rx) = test_state();
        let admin = seed_user(&state, "Ada", "orange", true);
        let err = approve(&state, &admin, 404, dt(NOW)).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_non_admin_cannot_review() {
        let (state, _rx) = test_state();
        let (user, booking) = pending_booking(&state);
        let err = approve(&state, &user, booking.id, dt(NOW)).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
