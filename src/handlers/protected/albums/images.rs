use axum::{
    extract::{rejection::PathRejection, rejection::QueryRejection, Path, Query, State},
    Extension,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::config;
use crate::database::models::Image;
use crate::middleware::{ApiResponse, ApiResult, ValidatedUser};
use crate::pagination::{Page, PageQuery, PageRequest};

/// GET /api/albums/:album_id/images?cursor=&limit= - Album images, newest first
pub async fn album_images_get(
    State(state): State<AppState>,
    Extension(user): Extension<ValidatedUser>,
    album_id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Page<Image>> {
    let Path(album_id) = album_id?;
    let Query(query) = query?;
    let pagination = &config::config().pagination;
    let page = PageRequest::from_query(&query, pagination.image_page_size, pagination.max_page_size)?;

    let images = state.albums().list_album_images(user.id, album_id, &page).await?;
    Ok(ApiResponse::success(images))
}
