// handlers/public/files.rs - GET /files/:key

use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::storage::content_type_for_key;

/// Serve a stored blob. Keys are unguessable uuids, so files are public.
pub async fn file_get(
    State(state): State<AppState>,
    key: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(key) = key?;
    let bytes = state.blobs.get(&key).await?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for_key(&key)),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        bytes,
    )
        .into_response())
}
