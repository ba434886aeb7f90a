use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::format::MemberView;
use crate::app::AppState;
use crate::database::models::AlbumRole;
use crate::middleware::{ApiResponse, ApiResult, ValidatedUser};

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    /// Usernames
    pub names: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: AlbumRole,
}

/// POST /api/albums/:album_id/members - Invite users by username (owners only)
///
/// Returns the members that were actually added; users who already belong
/// to the album are skipped.
pub async fn members_post(
    State(state): State<AppState>,
    Extension(user): Extension<ValidatedUser>,
    album_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<InviteRequest>, JsonRejection>,
) -> ApiResult<Vec<MemberView>> {
    let Path(album_id) = album_id?;
    let Json(request) = payload?;
    let added = state.albums().invite_members(user.id, album_id, &request.names).await?;
    Ok(ApiResponse::created(added))
}

/// PUT /api/albums/:album_id/members/:user_id - Change a member's role (owners only)
pub async fn member_put(
    State(state): State<AppState>,
    Extension(user): Extension<ValidatedUser>,
    ids: Result<Path<(Uuid, Uuid)>, PathRejection>,
    payload: Result<Json<RoleRequest>, JsonRejection>,
) -> ApiResult<MemberView> {
    let Path((album_id, target)) = ids?;
    let Json(request) = payload?;
    let member = state
        .albums()
        .update_member_role(user.id, album_id, target, request.role)
        .await?;
    Ok(ApiResponse::success(member))
}

/// DELETE /api/albums/:album_id/members/:user_id - Remove a member, or leave
pub async fn member_delete(
    State(state): State<AppState>,
    Extension(user): Extension<ValidatedUser>,
    ids: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> ApiResult<()> {
    let Path((album_id, target)) = ids?;
    state.albums().remove_member(user.id, album_id, target).await?;
    Ok(ApiResponse::no_content())
}
