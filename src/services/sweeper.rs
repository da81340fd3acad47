use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Booking;
use crate::services::local_now;
use crate::services::notifier::NotificationKind;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub completed: usize,
    pub reminders_sent: usize,
}

/// Move every scheduled booking whose start has passed to completed. Safe to re-run.
pub fn auto_complete(state: &AppState, now: NaiveDateTime) -> Result<usize, AppError> {
    let db = state.db()?;
    let count = queries::complete_elapsed_bookings(&db, &now)?;
    if count > 0 {
        tracing::info!(count, "completed elapsed bookings");
    }
    Ok(count)
}

fn reminder_window(state: &AppState, now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    (
        now + chrono::Duration::minutes(state.config.reminder_window_start_minutes),
        now + chrono::Duration::minutes(state.config.reminder_window_end_minutes),
    )
}

/// Scheduled bookings starting inside the reminder look-ahead that have not been reminded.
pub fn collect_reminders(state: &AppState, now: NaiveDateTime) -> Result<Vec<Booking>, AppError> {
    let (from, to) = reminder_window(state, now);
    let db = state.db()?;
    Ok(queries::bookings_due_for_reminder(&db, &from, &to)?)
}

/// Enqueue a reminder per due booking and only then set its marker. A booking whose
/// reminder could not be enqueued stays unmarked and is retried on the next run.
/// Collection, enqueue and marking share one lock so a booking cannot be cancelled
/// or moved in between.
pub fn dispatch_reminders(state: &AppState, now: NaiveDateTime) -> Result<usize, AppError> {
    let (from, to) = reminder_window(state, now);
    let db = state.db()?;
    let due = queries::bookings_due_for_reminder(&db, &from, &to)?;
    let mut sent = 0;

    for booking in &due {
        if let Err(e) = state
            .notifier
            .notify_booking(&db, booking, NotificationKind::WalkReminder)
        {
            tracing::warn!(booking_id = booking.id, error = %e, "failed to enqueue reminder");
            continue;
        }
        match queries::mark_reminder_sent(&db, booking.id, &now) {
            Ok(true) => sent += 1,
            Ok(false) => tracing::debug!(booking_id = booking.id, "reminder already marked"),
            Err(e) => tracing::error!(booking_id = booking.id, error = %e, "failed to mark reminder sent"),
        }
    }

    Ok(sent)
}

pub fn sweep(state: &AppState, now: NaiveDateTime) -> Result<SweepReport, AppError> {
    let completed = auto_complete(state, now)?;
    let reminders_sent = dispatch_reminders(state, now)?;
    Ok(SweepReport {
        completed,
        reminders_sent,
    })
}

/// Background task that periodically runs the sweep.
pub async fn run_sweeper(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(state.config.sweep_interval_secs.max(1)));
    loop {
        interval.tick().await;
        let state = Arc::clone(&state);
        let result = tokio::task::spawn_blocking(move || sweep(&state, local_now())).await;
        match result {
            Ok(Ok(report)) => tracing::debug!(?report, "sweep finished"),
            Ok(Err(e)) => tracing::error!(error = %e, "sweep failed"),
            Err(e) => tracing::error!(error = %e, "sweep task panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::parse_time;
    use crate::models::BookingStatus;
    use crate::services::admission::{create_booking, BookingRequest};
    use crate::services::test_support::{drain, dt, seed_dog, seed_user, test_state};
    use chrono::NaiveDate;

    fn book(state: &AppState, time: &str) -> Booking {
        let user = seed_user(state, &format!("U{}", time.replace(':', "")), "green", false);
        let dog = seed_dog(state, "Rex", "green");
        let req = BookingRequest {
            dog_id: dog,
            date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            scheduled_time: parse_time(time).unwrap(),
        };
        create_booking(state, &user, &req, dt("2025-06-13 08:00")).unwrap()
    }

    #[test]
    fn test_auto_complete_is_idempotent() {
        let (state, _rx) = test_state();
        let early = book(&state, "14:00");
        let late = book(&state, "18:00");

        let now = dt("2025-06-16 16:00");
        assert_eq!(auto_complete(&state, now).unwrap(), 1);
        assert_eq!(auto_complete(&state, now).unwrap(), 0);

        let db = state.db.lock().unwrap();
        let done = queries::get_booking_by_id(&db, early.id).unwrap().unwrap();
        assert_eq!(done.status, BookingStatus::Completed);
        assert_eq!(done.completed_at, Some(now));
        let pending = queries::get_booking_by_id(&db, late.id).unwrap().unwrap();
        assert_eq!(pending.status, BookingStatus::Scheduled);
    }

    #[test]
    fn test_reminders_sent_at_most_once() {
        let (state, mut rx) = test_state();
        let soon = book(&state, "14:00");
        book(&state, "17:00");
        drain(&mut rx);

        // 14:00 is 90 minutes out; 17:00 is beyond the two-hour window.
        let now = dt("2025-06-16 12:30");
        let due = collect_reminders(&state, now).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, soon.id);

        assert_eq!(dispatch_reminders(&state, now).unwrap(), 1);
        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::WalkReminder);

        assert_eq!(dispatch_reminders(&state, now).unwrap(), 0);
        assert!(collect_reminders(&state, now).unwrap().is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_reminder_not_marked_when_queue_closed() {
        let (state, rx) = test_state();
        book(&state, "14:00");
        drop(rx);

        let now = dt("2025-06-16 12:30");
        assert_eq!(dispatch_reminders(&state, now).unwrap(), 0);
        assert_eq!(collect_reminders(&state, now).unwrap().len(), 1);
    }

    #[test]
    fn test_sweep_reports_both_jobs() {
        let (state, _rx) = test_state();
        book(&state, "14:00");
        book(&state, "18:00");

        let report = sweep(&state, dt("2025-06-16 16:30")).unwrap();
        assert_eq!(
            report,
            SweepReport {
                completed: 1,
                reminders_sent: 1
            }
        );
    }
}
