// handlers/public/auth/register.rs - POST /auth/register handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;

use crate::api::format::UserProfile;
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/register - Create an account
///
/// The new user is not onboarded yet: album and image routes answer 403
/// `ONBOARDING_REQUIRED` until a username is chosen with
/// `PUT /api/account/onboarding`.
pub async fn register_post(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<UserProfile> {
    let Json(request) = payload?;
    let user = state.accounts().register(&request.email, &request.password).await?;
    Ok(ApiResponse::created(user))
}
