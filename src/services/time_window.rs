use chrono::{NaiveDate, NaiveTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::format::fmt_time;
use crate::models::time_rule::classify;
use crate::models::{BookingSettings, DayType, SlotVerdict};

/// Classify a requested slot against the rules for the date's day type.
pub fn evaluate(
    conn: &Connection,
    date: &NaiveDate,
    time: &NaiveTime,
    settings: &BookingSettings,
) -> anyhow::Result<SlotVerdict> {
    let rules = queries::list_time_rules(conn, Some(DayType::of(*date)))?;
    Ok(classify(&rules, *time, settings.approval_cutoff))
}

/// Turn a rejecting verdict into the user-facing error; bookable verdicts yield
/// whether approval is required.
pub fn admit(verdict: &SlotVerdict, time: &NaiveTime) -> Result<bool, AppError> {
    match verdict {
        SlotVerdict::Blocked { rule_name } => Err(AppError::validation(format!(
            "{} falls in the blocked '{rule_name}' window",
            fmt_time(time)
        ))),
        SlotVerdict::OutsideHours { hours } if hours.is_empty() => Err(AppError::validation(
            format!("{} is outside allowed hours (no bookable windows on this day)", fmt_time(time)),
        )),
        SlotVerdict::OutsideHours { hours } => Err(AppError::validation(format!(
            "{} is outside allowed hours ({hours})",
            fmt_time(time)
        ))),
        SlotVerdict::RequiresApproval { .. } | SlotVerdict::FreelyBookable { .. } => {
            Ok(verdict.requires_approval())
        }
    }
}
