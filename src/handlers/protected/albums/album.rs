use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::format::AlbumDetail;
use crate::app::AppState;
use crate::database::models::Album;
use crate::middleware::{ApiResponse, ApiResult, ValidatedUser};

#[derive(Debug, Deserialize)]
pub struct RenameAlbumRequest {
    pub name: String,
}

/// GET /api/albums/:album_id - Album with its members and the caller's role
pub async fn album_get(
    State(state): State<AppState>,
    Extension(user): Extension<ValidatedUser>,
    album_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<AlbumDetail> {
    let Path(album_id) = album_id?;
    let album = state.albums().get_album(user.id, album_id).await?;
    Ok(ApiResponse::success(album))
}

/// PATCH /api/albums/:album_id - Rename (owners only)
pub async fn album_patch(
    State(state): State<AppState>,
    Extension(user): Extension<ValidatedUser>,
    album_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<RenameAlbumRequest>, JsonRejection>,
) -> ApiResult<Album> {
    let Path(album_id) = album_id?;
    let Json(request) = payload?;
    let album = state.albums().rename_album(user.id, album_id, &request.name).await?;
    Ok(ApiResponse::success(album))
}

/// DELETE /api/albums/:album_id - Delete (owners only)
///
/// Images that were only in this album are deleted with it.
pub async fn album_delete(
    State(state): State<AppState>,
    Extension(user): Extension<ValidatedUser>,
    album_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<()> {
    let Path(album_id) = album_id?;
    state.albums().delete_album(user.id, album_id).await?;
    Ok(ApiResponse::no_content())
}
