use chrono::NaiveDateTime;

use crate::db::queries;
use crate::errors::{is_unique_violation, AppError};
use crate::models::{BookingSettings, BookingTimeRule, DayType, Principal, RuleDraft, SystemSetting};
use crate::services::require_admin;
use crate::state::AppState;

pub fn list_rules(state: &AppState, day_type: Option<DayType>) -> Result<Vec<BookingTimeRule>, AppError> {
    let db = state.db()?;
    Ok(queries::list_time_rules(&db, day_type)?)
}

fn name_taken(draft: &RuleDraft) -> AppError {
    AppError::conflict(format!(
        "a {} rule named '{}' already exists",
        draft.day_type.as_str(),
        draft.rule_name.trim()
    ))
}

pub fn create_rule(state: &AppState, principal: &Principal, draft: &RuleDraft) -> Result<BookingTimeRule, AppError> {
    require_admin(principal)?;
    let db = state.db()?;
    let existing = queries::list_time_rules(&db, Some(draft.day_type))?;
    draft.validate(&existing, None).map_err(AppError::Validation)?;

    let id = queries::insert_time_rule(&db, draft).map_err(|e| {
        if is_unique_violation(&e) {
            name_taken(draft)
        } else {
            AppError::Internal(e)
        }
    })?;
    tracing::info!(rule_id = id, day_type = draft.day_type.as_str(), admin = principal.user_id, "time rule created");

    queries::get_time_rule(&db, id)?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("time rule {id} vanished after insert")))
}

pub fn update_rule(
    state: &AppState,
    principal: &Principal,
    rule_id: i64,
    draft: &RuleDraft,
) -> Result<BookingTimeRule, AppError> {
    require_admin(principal)?;
    let db = state.db()?;
    if queries::get_time_rule(&db, rule_id)?.is_none() {
        return Err(AppError::not_found(format!("time rule {rule_id}")));
    }
    let existing = queries::list_time_rules(&db, Some(draft.day_type))?;
    draft.validate(&existing, Some(rule_id)).map_err(AppError::Validation)?;

    queries::update_time_rule(&db, rule_id, draft).map_err(|e| {
        if is_unique_violation(&e) {
            name_taken(draft)
        } else {
            AppError::Internal(e)
        }
    })?;
    tracing::info!(rule_id, admin = principal.user_id, "time rule updated");

    queries::get_time_rule(&db, rule_id)?.ok_or_else(|| AppError::not_found(format!("time rule {rule_id}")))
}

pub fn delete_rule(state: &AppState, principal: &Principal, rule_id: i64) -> Result<(), AppError> {
    require_admin(principal)?;
    let db = state.db()?;
    if !queries::delete_time_rule(&db, rule_id)? {
        return Err(AppError::not_found(format!("time rule {rule_id}")));
    }
    tracing::info!(rule_id, admin = principal.user_id, "time rule deleted");
    Ok(())
}

// ── Settings ──

pub fn list_settings(state: &AppState, principal: &Principal) -> Result<Vec<SystemSetting>, AppError> {
    require_admin(principal)?;
    let db = state.db()?;
    Ok(queries::list_settings(&db)?)
}

/// Only known keys with well-formed values are stored, so the booking engine never
/// has to fall back on a value an administrator typed.
pub fn update_setting(
    state: &AppState,
    principal: &Principal,
    key: &str,
    value: &str,
    now: NaiveDateTime,
) -> Result<SystemSetting, AppError> {
    require_admin(principal)?;
    BookingSettings::validate_value(key, value).map_err(AppError::Validation)?;
    let value = value.trim();

    let db = state.db()?;
    queries::upsert_setting(&db, key, value, &now)?;
    tracing::info!(key, value, admin = principal.user_id, "setting updated");

    let updated_at = queries::list_settings(&db)?
        .into_iter()
        .find(|s| s.key == key)
        .map(|s| s.updated_at)
        .unwrap_or_default();
    Ok(SystemSetting {
        key: key.to_string(),
        value: value.to_string(),
        updated_at,
    })
}
