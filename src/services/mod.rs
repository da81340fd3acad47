pub mod admission;
pub mod approval;
pub mod blocked_dates;
pub mod calendar;
pub mod conflict;
pub mod lifecycle;
pub mod mail;
pub mod notifier;
pub mod reschedule;
pub mod rules;
pub mod sweeper;
pub mod time_window;

use chrono::NaiveDateTime;

use crate::errors::AppError;
use crate::models::Principal;

/// Wall-clock time in the service's local timezone, which is the timezone walks are booked in.
pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

pub fn require_admin(principal: &Principal) -> Result<(), AppError> {
    if principal.is_admin {
        Ok(())
    } else {
        Err(AppError::forbidden("administrator access required"))
    }
}

/// Trimmed, non-empty free text or a validation error naming the field.
pub fn required_text(value: Option<&str>, field: &str) -> Result<String, AppError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::validation(format!("{field} is required"))),
    }
}

#[cfg(test)]
pub(crate) mod test_support;
