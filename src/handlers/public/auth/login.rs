// handlers/public/auth/login.rs - POST /auth/login handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;

use crate::api::format::AuthToken;
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/login - Authenticate with email and password
///
/// Expected Output:
/// ```json
/// {
///   "success": true,
///   "data": {
///     "token": "eyJhbGciOiJIUzI1NiI...",
///     "user": { "id": "...", "email": "ada@example.com", "name": null, "onboarded": false },
///     "expires_in": 604800
///   }
/// }
/// ```
///
/// Unknown email and wrong password both answer 401 with the same message.
pub async fn login_post(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<AuthToken> {
    let Json(request) = payload?;
    let token = state.accounts().login(&request.email, &request.password).await?;
    tracing::info!("User {} logged in", token.user.id);
    Ok(ApiResponse::success(token))
}
