use axum::{
    extract::{rejection::PathRejection, Path, State},
    Extension,
};
use uuid::Uuid;

use crate::api::format::ImageDetail;
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, ValidatedUser};

/// GET /api/images/:image_id - Image metadata and the caller's albums holding it
pub async fn image_get(
    State(state): State<AppState>,
    Extension(user): Extension<ValidatedUser>,
    image_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<ImageDetail> {
    let Path(image_id) = image_id?;
    let image = state.images().get_image(user.id, image_id).await?;
    Ok(ApiResponse::success(image))
}

/// DELETE /api/images/:image_id - Delete (uploader or album owner)
pub async fn image_delete(
    State(state): State<AppState>,
    Extension(user): Extension<ValidatedUser>,
    image_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<()> {
    let Path(image_id) = image_id?;
    state.images().delete_image(user.id, image_id).await?;
    Ok(ApiResponse::no_content())
}
