use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::HeaderMap,
    Extension,
};
use uuid::Uuid;

use crate::api::format::UploadResult;
use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, ValidatedUser};
use crate::services::UploadFile;

pub const ALBUM_ID_HEADER: &str = "x-album-id";

/// POST /api/uploads - Upload one image into the album named by `x-album-id`
///
/// Body: `multipart/form-data` with exactly one file part. Owners and
/// members may upload; viewers get 403.
pub async fn upload_post(
    State(state): State<AppState>,
    Extension(user): Extension<ValidatedUser>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<UploadResult> {
    let album_id = album_id_from_headers(&headers)?;
    let file = single_file(multipart?).await?;
    let result = state.images().upload(user.id, album_id, file).await?;
    Ok(ApiResponse::created(result))
}

/// POST /api/uploads/unsorted - Upload into the caller's "Unsorted" album
pub async fn unsorted_post(
    State(state): State<AppState>,
    Extension(user): Extension<ValidatedUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<UploadResult> {
    let file = single_file(multipart?).await?;
    let result = state.images().upload_unsorted(user.id, file).await?;
    Ok(ApiResponse::created(result))
}

fn album_id_from_headers(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    let raw = headers
        .get(ALBUM_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing album ID header"))?;

    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("Invalid album ID header"))
}

/// Read the multipart body, requiring exactly one file part. Text fields
/// are ignored.
async fn single_file(mut multipart: Multipart) -> Result<UploadFile, ApiError> {
    let mut file: Option<UploadFile> = None;

    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_none() {
            continue;
        }
        if file.is_some() {
            return Err(ApiError::field_error("file", "Exactly one file must be uploaded"));
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        file = Some(UploadFile {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    file.ok_or_else(|| ApiError::field_error("file", "Exactly one file must be uploaded"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn album_header_is_required_and_parsed() {
        let mut headers = HeaderMap::new();
        let err = album_id_from_headers(&headers).unwrap_err();
        assert_eq!(err.message(), "Missing album ID header");

        headers.insert(ALBUM_ID_HEADER, HeaderValue::from_static("nope"));
        assert!(album_id_from_headers(&headers).is_err());

        let id = Uuid::new_v4();
        headers.insert(ALBUM_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        assert_eq!(album_id_from_headers(&headers).unwrap(), id);
    }
}
