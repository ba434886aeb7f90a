use axum::{extract::rejection::JsonRejection, extract::State, Extension, Json};
use serde::Deserialize;

use crate::api::format::UserProfile;
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, ValidatedUser};

#[derive(Debug, Deserialize)]
pub struct OnboardingRequest {
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// PUT /api/account/onboarding - Choose a username (and avatar)
///
/// Expected Input:
/// ```json
/// { "name": "ada.l", "avatar_url": "https://..." }
/// ```
///
/// Usernames are 3-32 characters of letters, digits, `.`, `_` and `-`, and
/// unique across users (409 when taken).
pub async fn onboarding_put(
    State(state): State<AppState>,
    Extension(user): Extension<ValidatedUser>,
    payload: Result<Json<OnboardingRequest>, JsonRejection>,
) -> ApiResult<UserProfile> {
    let Json(request) = payload?;
    let profile = state
        .accounts()
        .onboard(user.id, &request.name, request.avatar_url.as_deref())
        .await?;
    Ok(ApiResponse::success(profile))
}
