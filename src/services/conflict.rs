use chrono::{NaiveDate, NaiveTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::{is_unique_violation, AppError};
use crate::models::format::{fmt_date, fmt_time};

/// Optimistic pre-check for an occupied walk slot. The partial unique index on
/// scheduled bookings is what actually guarantees exclusivity; callers must still
/// run write errors through [`classify_write_error`].
pub fn check_double_booking(
    conn: &Connection,
    dog_id: i64,
    date: &NaiveDate,
    time: &NaiveTime,
    excluding: Option<i64>,
) -> anyhow::Result<bool> {
    queries::has_active_booking(conn, dog_id, date, time, excluding)
}

pub fn slot_taken(dog_id: i64, date: &NaiveDate, time: &NaiveTime) -> AppError {
    AppError::conflict(format!(
        "dog {dog_id} is already booked on {} at {}",
        fmt_date(date),
        fmt_time(time)
    ))
}

/// A lost insert/update race surfaces as a UNIQUE violation; report it exactly like a
/// failed pre-check. Anything else is an internal error.
pub fn classify_write_error(
    err: anyhow::Error,
    dog_id: i64,
    date: &NaiveDate,
    time: &NaiveTime,
) -> AppError {
    if is_unique_violation(&err) {
        tracing::info!(dog_id, date = %date, time = %time, "walk slot race lost at insert");
        slot_taken(dog_id, date, time)
    } else {
        AppError::Internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::format::{parse_date, parse_time};
    use crate::models::NewBooking;
    use axum::http::StatusCode;
    use chrono::NaiveDateTime;

    #[test]
    fn test_lost_race_becomes_conflict() {
        let conn = db::init_db(":memory:").unwrap();
        let user = queries::insert_user(&conn, "Una", "una@example.com", "green", false, "t").unwrap();
        let dog = queries::insert_dog(&conn, "Rex", "green", true).unwrap();
        let date = parse_date("2025-06-16").unwrap();
        let time = parse_time("14:00").unwrap();
        let now = NaiveDateTime::parse_from_str("2025-06-01 08:00", "%Y-%m-%d %H:%M").unwrap();
        let new = NewBooking {
            user_id: user,
            dog_id: dog,
            date,
            scheduled_time: time,
            requires_approval: false,
        };

        assert!(!check_double_booking(&conn, dog, &date, &time, None).unwrap());
        queries::insert_booking(&conn, &new, &now).unwrap();
        assert!(check_double_booking(&conn, dog, &date, &time, None).unwrap());

        // Simulate a request whose pre-check ran before the first insert landed.
        let err = queries::insert_booking(&conn, &new, &now).unwrap_err();
        let mapped = classify_write_error(err, dog, &date, &time);
        assert_eq!(mapped.status(), StatusCode::CONFLICT);
        assert_eq!(mapped.to_string(), slot_taken(dog, &date, &time).to_string());
    }

    #[test]
    fn test_other_write_errors_stay_internal() {
        let date = parse_date("2025-06-16").unwrap();
        let time = parse_time("14:00").unwrap();
        let mapped = classify_write_error(anyhow::anyhow!("disk I/O error"), 1, &date, &time);
        assert_eq!(mapped.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
