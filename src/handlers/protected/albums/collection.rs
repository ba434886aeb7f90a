use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::format::AlbumSummary;
use crate::app::AppState;
use crate::config;
use crate::middleware::{ApiResponse, ApiResult, ValidatedUser};
use crate::pagination::{Page, PageQuery, PageRequest};

#[derive(Debug, Deserialize)]
pub struct CreateAlbumRequest {
    pub name: String,
    #[serde(default)]
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CreatedAlbum {
    pub album_id: Uuid,
}

/// GET /api/albums?cursor=&limit= - Albums of the current user, newest first
///
/// Expected Output:
/// ```json
/// {
///   "success": true,
///   "data": {
///     "items": [{ "id": "...", "name": "Summer", "image_count": 3,
///                 "latest_image": { "id": "...", "url": "..." },
///                 "members": [{ "id": "...", "name": "ada", "role": "OWNER" }],
///                 "your_role": "OWNER", ... }],
///     "next_cursor": "eyJsYXN0Q3JlYXRlZEF0Ijo...",
///     "has_more": true
///   }
/// }
/// ```
pub async fn albums_get(
    State(state): State<AppState>,
    Extension(user): Extension<ValidatedUser>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Page<AlbumSummary>> {
    let Query(query) = query?;
    let pagination = &config::config().pagination;
    let page = PageRequest::from_query(&query, pagination.album_page_size, pagination.max_page_size)?;

    let albums = state.albums().list_albums(user.id, &page).await?;
    Ok(ApiResponse::success(albums))
}

/// POST /api/albums - Create an album
///
/// The caller becomes OWNER; every id in `user_ids` joins as MEMBER.
pub async fn albums_post(
    State(state): State<AppState>,
    Extension(user): Extension<ValidatedUser>,
    payload: Result<Json<CreateAlbumRequest>, JsonRejection>,
) -> ApiResult<CreatedAlbum> {
    let Json(request) = payload?;
    let album = state
        .albums()
        .create_album(user.id, &request.name, &request.user_ids)
        .await?;
    Ok(ApiResponse::created(CreatedAlbum { album_id: album.id }))
}
