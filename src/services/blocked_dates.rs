use chrono::{NaiveDate, NaiveDateTime};

use crate::db::queries;
use crate::errors::{is_unique_violation, AppError};
use crate::models::format::fmt_date;
use crate::models::{BlockedDate, CascadeReport, Principal};
use crate::services::notifier::NotificationKind;
use crate::services::{require_admin, required_text};
use crate::state::AppState;

pub fn list_blocked_dates(
    state: &AppState,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<BlockedDate>, AppError> {
    let db = state.db()?;
    Ok(queries::list_blocked_dates(&db, start.as_ref(), end.as_ref())?)
}

/// Close a day and cancel every scheduled booking on it. Each booking is handled on
/// its own: a failure is logged and the cascade moves on.
pub fn block_date(
    state: &AppState,
    principal: &Principal,
    date: NaiveDate,
    reason: Option<&str>,
    now: NaiveDateTime,
) -> Result<CascadeReport, AppError> {
    require_admin(principal)?;
    let reason = required_text(reason, "reason")?;

    let db = state.db()?;
    queries::insert_blocked_date(&db, &date, &reason, principal.user_id, &now).map_err(|e| {
        if is_unique_violation(&e) {
            AppError::conflict(format!("{} is already blocked", fmt_date(&date)))
        } else {
            AppError::Internal(e)
        }
    })?;
    let blocked_date = queries::get_blocked_date(&db, &date)?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("blocked date vanished after insert")))?;

    let affected = queries::scheduled_bookings_on(&db, &date)?;
    let cancellation_reason = format!("Date blocked: {reason}");
    let mut cancelled_count = 0;

    for booking in &affected {
        match queries::cancel_booking(&db, booking.id, Some(&cancellation_reason), &now) {
            Ok(true) => cancelled_count += 1,
            Ok(false) => {
                tracing::warn!(booking_id = booking.id, "booking left scheduled state during cascade");
                continue;
            }
            Err(e) => {
                tracing::warn!(booking_id = booking.id, error = %e, "failed to cancel booking for blocked date");
                continue;
            }
        }

        let kind = NotificationKind::AdminCancellation {
            reason: cancellation_reason.clone(),
        };
        if let Err(e) = state.notifier.notify_booking(&db, booking, kind) {
            tracing::warn!(
                booking_id = booking.id,
                user_id = booking.user_id,
                error = %e,
                "failed to notify user of blocked-date cancellation"
            );
        }
    }

    tracing::info!(
        date = %date,
        admin = principal.user_id,
        affected = affected.len(),
        cancelled = cancelled_count,
        "date blocked"
    );

    Ok(CascadeReport {
        blocked_date,
        affected_count: affected.len(),
        cancelled_count,
    })
}

/// Reopens the day. Bookings cancelled by the block stay cancelled.
pub fn unblock_date(state: &AppState, principal: &Principal, date: NaiveDate) -> Result<(), AppError> {
    require_admin(principal)?;
    let db = state.db()?;
    if !queries::delete_blocked_date(&db, &date)? {
        return Err(AppError::not_found(format!("blocked date {}", fmt_date(&date))));
    }
    tracing::info!(date = %date, admin = principal.user_id, "date unblocked");
    Ok(())
}
