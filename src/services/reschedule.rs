use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::format::hhmm;
use crate::models::{Booking, Principal};
use crate::services::admission::{check_not_blocked, check_not_past};
use crate::services::conflict::{check_double_booking, classify_write_error, slot_taken};
use crate::services::notifier::NotificationKind;
use crate::services::{require_admin, required_text};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct MoveRequest {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub scheduled_time: NaiveTime,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Relocate a scheduled booking in place. Only the new slot is re-validated; the
/// walker's identity and tier were checked when the booking was admitted.
pub fn move_booking(
    state: &AppState,
    principal: &Principal,
    booking_id: i64,
    req: &MoveRequest,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    require_admin(principal)?;
    let reason = required_text(req.reason.as_deref(), "reason")?;

    let db = state.db()?;
    let before = queries::get_booking_by_id(&db, booking_id)?
        .ok_or_else(|| AppError::not_found(format!("booking {booking_id}")))?;
    if before.status.is_terminal() {
        return Err(AppError::validation(format!(
            "only scheduled bookings can be moved (booking is {})",
            before.status.as_str()
        )));
    }

    check_not_past(&req.date, &now.date())?;
    check_not_blocked(&db, &req.date)?;
    if check_double_booking(&db, before.dog_id, &req.date, &req.scheduled_time, Some(booking_id))? {
        return Err(slot_taken(before.dog_id, &req.date, &req.scheduled_time));
    }

    let moved = queries::move_booking(&db, booking_id, &req.date, &req.scheduled_time, &now)
        .map_err(|e| classify_write_error(e, before.dog_id, &req.date, &req.scheduled_time))?;
    if !moved {
        return Err(AppError::validation("booking is no longer scheduled"));
    }

    let after = queries::get_booking_by_id(&db, booking_id)?
        .ok_or_else(|| AppError::not_found(format!("booking {booking_id}")))?;

    tracing::info!(
        booking_id,
        from = %before.starts_at(),
        to = %after.starts_at(),
        admin = principal.user_id,
        "booking moved"
    );
    state.notifier.notify_quietly(
        &db,
        &after,
        NotificationKind::BookingMoved {
            old_date: before.date,
            old_time: before.scheduled_time,
            reason,
        },
    );

    Ok(after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::parse_time;
    use crate::models::BookingStatus;
    use crate::services::admission::{create_booking, BookingRequest};
    use crate::services::test_support::{drain, dt, seed_dog, seed_user, test_state};
    use axum::http::StatusCode;

    const NOW: &str = "2025-06-13 08:00";

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn book(state: &AppState, user: &Principal, dog: i64, d: &str, t: &str) -> Booking {
        let req = BookingRequest {
            dog_id: dog,
            date: date(d),
            scheduled_time: parse_time(t).unwrap(),
        };
        create_booking(state, user, &req, dt(NOW)).unwrap()
    }

    fn move_to(d: &str, t: &str) -> MoveRequest {
        MoveRequest {
            date: date(d),
            scheduled_time: parse_time(t).unwrap(),
            reason: Some("walker swap".to_string()),
        }
    }

    #[test]
    fn test_move_preserves_identity_and_history() {
        let (state, mut rx) = test_state();
        let admin = seed_user(&state, "Ada", "orange", true);
        let user = seed_user(&state, "Una", "green", false);
        let dog = seed_dog(&state, "Rex", "green");
        let original = book(&state, &user, dog, "2025-06-16", "14:00");
        drain(&mut rx);

        let moved = move_booking(&state, &admin, original.id, &move_to("2025-06-17", "15:30"), dt(NOW)).unwrap();
        assert_eq!(moved.id, original.id);
        assert_eq!(moved.date, date("2025-06-17"));
        assert_eq!(moved.created_at, original.created_at);
        assert_eq!(moved.approval_status, original.approval_status);

        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0].kind, NotificationKind::BookingMoved { .. }));
    }

    #[test]
    fn test_move_into_occupied_slot_conflicts() {
        let (state, _rx) = test_state();
        let admin = seed_user(&state, "Ada", "orange", true);
        let user = seed_user(&state, "Una", "green", false);
        let dog = seed_dog(&state, "Rex", "green");
        let first = book(&state, &user, dog, "2025-06-16", "14:00");
        book(&state, &user, dog, "2025-06-16", "15:00");

        let err = move_booking(&state, &admin, first.id, &move_to("2025-06-16", "15:00"), dt(NOW)).unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_move_onto_blocked_date_rejected() {
        let (state, _rx) = test_state();
        let admin = seed_user(&state, "Ada", "orange", true);
        let user = seed_user(&state, "Una", "green", false);
        let dog = seed_dog(&state, "Rex", "green");
        let booking = book(&state, &user, dog, "2025-06-16", "14:00");
        {
            let db = state.db.lock().unwrap();
            queries::insert_blocked_date(&db, &date("2025-06-18"), "vet day", admin.user_id, &dt(NOW)).unwrap();
        }

        let err = move_booking(&state, &admin, booking.id, &move_to("2025-06-18", "14:00"), dt(NOW)).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("vet day"));
    }

    #[test]
    fn test_terminal_bookings_cannot_move() {
        let (state, _rx) = test_state();
        let admin = seed_user(&state, "Ada", "orange", true);
        let user = seed_user(&state, "Una", "green", false);
        let dog = seed_dog(&state, "Rex", "green");
        let cancelled = book(&state, &user, dog, "2025-06-16", "14:00");
        let completed = book(&state, &user, dog, "2025-06-13", "14:00");
        {
            let db = state.db.lock().unwrap();
            queries::cancel_booking(&db, cancelled.id, None, &dt(NOW)).unwrap();
            queries::complete_elapsed_bookings(&db, &dt("2025-06-13 15:00")).unwrap();
            let stored = queries::get_booking_by_id(&db, completed.id).unwrap().unwrap();
            assert_eq!(stored.status, BookingStatus::Completed);
        }

        for id in [cancelled.id, completed.id] {
            let err = move_booking(&state, &admin, id, &move_to("2025-06-20", "14:00"), dt(NOW)).unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_move_requires_admin_and_reason() {
        let (state, _rx) = test_state();
        let admin = seed_user(&state, "Ada", "orange", true);
        let user = seed_user(&state, "Una", "green", false);
        let dog = seed_dog(&state, "Rex", "green");
        let booking = book(&state, &user, dog, "2025-06-16", "14:00");

        let err = move_booking(&state, &user, booking.id, &move_to("2025-06-17", "14:00"), dt(NOW)).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let mut req = move_to("2025-06-17", "14:00");
        req.reason = None;
        let err = move_booking(&state, &admin, booking.id, &req, dt(NOW)).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
