use chrono::{Datelike, NaiveDate};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BlockedDate, Booking, CalendarDay, CalendarMonth, Principal};
use crate::state::AppState;

fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

/// Lay bookings and blocked dates onto every day of the month. Days without
/// bookings get an empty list.
pub fn build_month(
    year: i32,
    month: u32,
    bookings: Vec<Booking>,
    blocked: &[BlockedDate],
) -> Option<CalendarMonth> {
    let (first, last) = month_bounds(year, month)?;

    let mut days: Vec<CalendarDay> = first
        .iter_days()
        .take_while(|d| *d <= last)
        .map(|date| {
            let block = blocked.iter().find(|b| b.date == date);
            CalendarDay {
                date,
                bookings: Vec::new(),
                is_blocked: block.is_some(),
                blocked_reason: block.map(|b| b.reason.clone()),
            }
        })
        .collect();

    for booking in bookings {
        if booking.date.year() == year && booking.date.month() == month {
            let idx = booking.date.day0() as usize;
            days[idx].bookings.push(booking);
        }
    }

    Some(CalendarMonth { year, month, days })
}

/// Month view for the caller. Administrators see every booking.
pub fn month_view(
    state: &AppState,
    principal: &Principal,
    year: i32,
    month: u32,
) -> Result<CalendarMonth, AppError> {
    let (first, last) = month_bounds(year, month)
        .ok_or_else(|| AppError::validation(format!("invalid month: {year}-{month}")))?;
    let scope = (!principal.is_admin).then_some(principal.user_id);

    let (bookings, blocked) = {
        let db = state.db()?;
        (
            queries::get_bookings_in_range(&db, scope, &first, &last)?,
            queries::list_blocked_dates(&db, Some(&first), Some(&last))?,
        )
    };

    build_month(year, month, bookings, &blocked)
        .ok_or_else(|| AppError::validation(format!("invalid month: {year}-{month}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{dt, seed_dog, seed_user, test_state};
    use crate::models::format::parse_time;
    use crate::services::admission::{create_booking, BookingRequest};

    #[test]
    fn test_month_lengths() {
        assert_eq!(build_month(2025, 2, vec![], &[]).unwrap().days.len(), 28);
        assert_eq!(build_month(2024, 2, vec![], &[]).unwrap().days.len(), 29);
        assert_eq!(build_month(2025, 4, vec![], &[]).unwrap().days.len(), 30);
        assert_eq!(build_month(2025, 12, vec![], &[]).unwrap().days.len(), 31);
    }

    #[test]
    fn test_invalid_month() {
        assert!(build_month(2025, 13, vec![], &[]).is_none());
        assert!(build_month(2025, 0, vec![], &[]).is_none());
    }

    #[test]
    fn test_every_day_has_a_booking_list() {
        let month = build_month(2025, 12, vec![], &[]).unwrap();
        assert!(month.days.iter().all(|d| d.bookings.is_empty() && !d.is_blocked));
        let json = serde_json::to_value(&month).unwrap();
        assert!(json["days"][30]["bookings"].is_array());
        assert_eq!(json["days"][30]["date"], "2025-12-31");
    }

    #[test]
    fn test_month_view_places_bookings_and_blocks() {
        let (state, _rx) = test_state();
        let admin = seed_user(&state, "Ada", "orange", true);
        let una = seed_user(&state, "Una", "green", false);
        let ola = seed_user(&state, "Ola", "green", false);
        let dog = seed_dog(&state, "Rex", "green");
        let now = dt("2025-06-13 08:00");

        for (user, time) in [(&una, "14:00"), (&ola, "15:00")] {
            let req = BookingRequest {
                dog_id: dog,
                date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
                scheduled_time: parse_time(time).unwrap(),
            };
            create_booking(&state, user, &req, now).unwrap();
        }
        {
            let db = state.db.lock().unwrap();
            let date = NaiveDate::from_ymd_opt(2025, 6, 20).unwrap();
            queries::insert_blocked_date(&db, &date, "vet day", admin.user_id, &now).unwrap();
        }

        let view = month_view(&state, &una, 2025, 6).unwrap();
        assert_eq!(view.days.len(), 30);
        assert_eq!(view.days[15].bookings.len(), 1);
        assert!(view.days[19].is_blocked);
        assert_eq!(view.days[19].blocked_reason.as_deref(), Some("vet day"));

        let all = month_view(&state, &admin, 2025, 6).unwrap();
        assert_eq!(all.days[15].bookings.len(), 2);
    }
}
