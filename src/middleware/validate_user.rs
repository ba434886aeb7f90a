use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::app::AppState;
use crate::database::models::User;
use crate::error::ApiError;

/// The token's user, loaded from the users table
#[derive(Clone, Debug, Serialize)]
pub struct ValidatedUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub onboarded: bool,
}

impl From<User> for ValidatedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            avatar_url: user.avatar_url,
            onboarded: user.onboarded,
        }
    }
}

/// Middleware that loads the user named by the JWT. Tokens of deleted
/// users are rejected.
pub async fn validate_user_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before user validation"))?;

    let user = state
        .store
        .find_user(auth_user.user_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!("Token for unknown user {}", auth_user.user_id);
            ApiError::unauthorized("User no longer exists")
        })?;

    request.extensions_mut().insert(ValidatedUser::from(user));
    Ok(next.run(request).await)
}

/// Album and image routes are closed until the user picked a username
pub async fn require_onboarded_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let onboarded = request
        .extensions()
        .get::<ValidatedUser>()
        .map(|user| user.onboarded)
        .ok_or_else(|| ApiError::unauthorized("User validation required before onboarding check"))?;

    if !onboarded {
        return Err(ApiError::OnboardingRequired);
    }
    Ok(next.run(request).await)
}
