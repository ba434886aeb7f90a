use axum::{extract::State, Extension};

use crate::api::format::UserProfile;
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, ValidatedUser};

/// GET /api/auth/whoami - Current user profile, fresh from the users table
pub async fn whoami_get(
    State(state): State<AppState>,
    Extension(user): Extension<ValidatedUser>,
) -> ApiResult<UserProfile> {
    let profile = state.accounts().profile(user.id).await?;
    Ok(ApiResponse::success(profile))
}
