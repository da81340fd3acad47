use axum::http::HeaderMap;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Principal;
use crate::state::AppState;

/// Resolve the caller from `Authorization: Bearer <api_token>`. Inactive users keep
/// their identity here; admission decides what they may do.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Principal, AppError> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized)?;

    let user = {
        let db = state.db()?;
        queries::get_user_by_token(&db, token)?
    }
    .ok_or(AppError::Unauthorized)?;

    Ok(Principal {
        user_id: user.id,
        is_admin: user.is_admin,
    })
}
