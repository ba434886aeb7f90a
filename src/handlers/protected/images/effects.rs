use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::format::UploadResult;
use crate::app::AppState;
use crate::effects::Effects;
use crate::middleware::{ApiResponse, ApiResult, ValidatedUser};

#[derive(Debug, Deserialize)]
pub struct EffectsRequest {
    #[serde(flatten)]
    pub effects: Effects,
    /// Album for the derived image; defaults to the first album holding the
    /// source where the caller may upload
    #[serde(default)]
    pub album_id: Option<Uuid>,
}

/// POST /api/images/:image_id/effects - Derive a new image
///
/// Expected Input:
/// ```json
/// { "grayscale": true, "invert": false, "flip_horizontal": true, "flip_vertical": false }
/// ```
///
/// Effects run in the order grayscale, invert, horizontal flip, vertical
/// flip. The source image is left untouched.
pub async fn effects_post(
    State(state): State<AppState>,
    Extension(user): Extension<ValidatedUser>,
    image_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<EffectsRequest>, JsonRejection>,
) -> ApiResult<UploadResult> {
    let Path(image_id) = image_id?;
    let Json(request) = payload?;
    let derived = state
        .images()
        .apply_effects(user.id, image_id, request.effects, request.album_id)
        .await?;
    Ok(ApiResponse::created(derived))
}
