use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::access::{self, UPLOAD_FORBIDDEN};
use crate::api::format::{ImageDetail, UploadResult};
use crate::config;
use crate::database::models::{AlbumRole, Image, NewImage};
use crate::database::Store;
use crate::effects::{self, Effects};
use crate::error::ApiError;
use crate::storage::{self, BlobStore};

pub const UNSORTED_ALBUM: &str = "Unsorted";
const IMAGE_NOT_FOUND: &str = "Image not found";
const MAX_FILENAME_LEN: usize = 255;

/// An uploaded file before validation
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

/// Uploads, image lookups and the effects pipeline
pub struct ImageService {
    store: Arc<dyn Store>,
    blobs: Arc<dyn BlobStore>,
}

impl ImageService {
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    pub async fn upload(&self, user_id: Uuid, album_id: Uuid, file: UploadFile) -> Result<UploadResult, ApiError> {
        access::require_uploader(self.store.as_ref(), album_id, user_id).await?;

        let max = config::config().storage.max_upload_bytes;
        if file.bytes.len() > max {
            return Err(ApiError::payload_too_large(format!(
                "File exceeds the maximum upload size of {} bytes",
                max
            )));
        }
        if file.bytes.is_empty() {
            return Err(ApiError::field_error("file", "File is empty"));
        }

        let UploadFile { filename, bytes } = file;
        let (info, bytes) = tokio::task::spawn_blocking(move || effects::inspect(&bytes).map(|info| (info, bytes)))
            .await??;

        let id = Uuid::new_v4();
        let filename = sanitize_filename(filename.as_deref(), info.extension);
        let image = NewImage {
            id,
            user_id,
            url: String::new(),
            storage_key: storage::object_key(id, info.extension),
            filename,
            content_type: info.content_type.to_string(),
            size_bytes: bytes.len() as i64,
            width: info.width as i32,
            height: info.height as i32,
            derived_from: None,
            effects: Vec::new(),
        };

        let image = self.persist(image, bytes, album_id).await?;
        info!("User {} uploaded image {} to album {}", user_id, image.id, album_id);
        Ok(UploadResult {
            image,
            uploaded_by: user_id,
            album_id,
        })
    }

    /// Upload into the caller's "Unsorted" album, creating it on first use
    pub async fn upload_unsorted(&self, user_id: Uuid, file: UploadFile) -> Result<UploadResult, ApiError> {
        let album = match self
            .store
            .find_album_by_name(user_id, UNSORTED_ALBUM, AlbumRole::Owner)
            .await?
        {
            Some(album) => album,
            None => {
                let album = self
                    .store
                    .create_album(UNSORTED_ALBUM, &[(user_id, AlbumRole::Owner)])
                    .await?;
                info!("Created Unsorted album {} for user {}", album.id, user_id);
                album
            }
        };
        self.upload(user_id, album.id, file).await
    }

    pub async fn get_image(&self, user_id: Uuid, image_id: Uuid) -> Result<ImageDetail, ApiError> {
        let image = self.find(image_id).await?;
        let visible = self.visible_albums(user_id, image_id).await?;
        if visible.is_empty() {
            return Err(ApiError::not_found(IMAGE_NOT_FOUND));
        }
        Ok(ImageDetail {
            image,
            album_ids: visible.into_iter().map(|(album_id, _)| album_id).collect(),
        })
    }

    /// The uploader or an owner of a containing album may delete an image.
    pub async fn delete_image(&self, user_id: Uuid, image_id: Uuid) -> Result<(), ApiError> {
        let image = self.find(image_id).await?;
        let visible = self.visible_albums(user_id, image_id).await?;
        if visible.is_empty() {
            return Err(ApiError::not_found(IMAGE_NOT_FOUND));
        }

        let owns_album = visible.iter().any(|(_, role)| role.can_manage());
        if image.user_id != user_id && !owns_album {
            return Err(ApiError::forbidden(
                "Only the uploader or an album owner can delete this image",
            ));
        }

        self.store.delete_image(image_id).await?;
        if let Err(e) = self.blobs.delete(&image.storage_key).await {
            warn!("Failed to delete blob {} of image {}: {}", image.storage_key, image.id, e);
        }
        info!("User {} deleted image {}", user_id, image_id);
        Ok(())
    }

    /// Apply effects to an image and store the result as a new image.
    ///
    /// Without `album_id` the result goes to the first album containing the
    /// source where the caller may upload.
    pub async fn apply_effects(
        &self,
        user_id: Uuid,
        image_id: Uuid,
        effects: Effects,
        album_id: Option<Uuid>,
    ) -> Result<UploadResult, ApiError> {
        effects.ensure_selected()?;

        let source = self.find(image_id).await?;
        let visible = self.visible_albums(user_id, image_id).await?;
        if visible.is_empty() {
            return Err(ApiError::not_found(IMAGE_NOT_FOUND));
        }

        let album_id = match album_id {
            Some(album_id) => {
                access::require_uploader(self.store.as_ref(), album_id, user_id).await?;
                album_id
            }
            None => visible
                .iter()
                .find(|(_, role)| role.can_upload())
                .map(|(album_id, _)| *album_id)
                .ok_or_else(|| ApiError::forbidden(UPLOAD_FORBIDDEN))?,
        };

        let bytes = self.blobs.get(&source.storage_key).await?;
        let processed = tokio::task::spawn_blocking(move || effects::process(&bytes, effects)).await??;
        debug!(
            "Applied {:?} to image {} ({}x{})",
            effects.names(),
            image_id,
            processed.width,
            processed.height
        );

        let id = Uuid::new_v4();
        let extension = processed.format.extension();
        let image = NewImage {
            id,
            user_id,
            url: String::new(),
            storage_key: storage::object_key(id, extension),
            filename: effects::derived_filename(&source.filename, &effects, processed.format),
            content_type: processed.format.content_type().to_string(),
            size_bytes: processed.bytes.len() as i64,
            width: processed.width as i32,
            height: processed.height as i32,
            derived_from: Some(source.id),
            effects: effects.names().into_iter().map(str::to_string).collect(),
        };

        let image = self.persist(image, processed.bytes, album_id).await?;
        info!("User {} derived image {} from {}", user_id, image.id, image_id);
        Ok(UploadResult {
            image,
            uploaded_by: user_id,
            album_id,
        })
    }

    /// Store the blob, then the rows. The blob is removed again if the rows fail.
    async fn persist(&self, mut image: NewImage, bytes: Vec<u8>, album_id: Uuid) -> Result<Image, ApiError> {
        image.url = config::config().file_url(&image.storage_key);
        let key = image.storage_key.clone();

        self.blobs.put(&key, bytes).await?;
        match self.store.insert_image(image, album_id).await {
            Ok(image) => Ok(image),
            Err(e) => {
                if let Err(cleanup) = self.blobs.delete(&key).await {
                    warn!("Failed to remove blob {} after insert error: {}", key, cleanup);
                }
                Err(e.into())
            }
        }
    }

    async fn find(&self, image_id: Uuid) -> Result<Image, ApiError> {
        self.store
            .find_image(image_id)
            .await?
            .ok_or_else(|| ApiError::not_found(IMAGE_NOT_FOUND))
    }

    /// Albums containing the image in which the caller is a member, with the caller's role
    async fn visible_albums(&self, user_id: Uuid, image_id: Uuid) -> Result<Vec<(Uuid, AlbumRole)>, ApiError> {
        let mut seen = HashSet::new();
        let mut visible = Vec::new();
        for album_id in self.store.image_albums(image_id).await? {
            if !seen.insert(album_id) {
                continue;
            }
            if let Some(role) = self.store.member_role(album_id, user_id).await? {
                visible.push((album_id, role));
            }
        }
        Ok(visible)
    }
}

/// Base name of the client's filename, falling back to `image.<ext>`
fn sanitize_filename(raw: Option<&str>, extension: &str) -> String {
    let base = raw
        .map(|name| name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name).trim())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(|name| name.chars().filter(|c| !c.is_control()).collect::<String>());

    match base {
        Some(name) if !name.is_empty() => name.chars().take(MAX_FILENAME_LEN).collect(),
        _ => format!("image.{}", extension),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewUser;
    use crate::database::MemoryStore;
    use crate::effects::{encode, OutputFormat};
    use crate::storage::MemoryBlobStore;
    use axum::http::StatusCode;
    use image::{DynamicImage, ImageBuffer, Rgba};

    struct Fixture {
        store: Arc<MemoryStore>,
        blobs: Arc<MemoryBlobStore>,
        service: ImageService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::default());
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = ImageService::new(store.clone(), blobs.clone());
        Fixture { store, blobs, service }
    }

    async fn user(store: &MemoryStore, name: &str) -> Uuid {
        let id = store
            .insert_user(NewUser {
                email: format!("{}@example.com", name),
                password_hash: "x".into(),
            })
            .await
            .unwrap()
            .id;
        store.update_profile(id, name, None).await.unwrap();
        id
    }

    fn png(width: u32, height: u32) -> UploadFile {
        let mut buffer = ImageBuffer::from_pixel(width, height, Rgba([0, 0, 0, 255]));
        buffer.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        UploadFile {
            filename: Some("photos/beach.png".into()),
            bytes: encode(&DynamicImage::ImageRgba8(buffer), OutputFormat::Png).unwrap(),
        }
    }

    #[test]
    fn filenames_are_reduced_to_base_names() {
        assert_eq!(sanitize_filename(Some("a/b/c.png"), "png"), "c.png");
        assert_eq!(sanitize_filename(Some("C:\\pics\\d.jpg"), "jpg"), "d.jpg");
        assert_eq!(sanitize_filename(Some("  "), "gif"), "image.gif");
        assert_eq!(sanitize_filename(None, "png"), "image.png");
        assert_eq!(sanitize_filename(Some(".."), "png"), "image.png");
    }

    #[tokio::test]
    async fn upload_stores_blob_and_rows() {
        let f = fixture();
        let ada = user(&f.store, "ada").await;
        let album = f.store.create_album("Trip", &[(ada, AlbumRole::Owner)]).await.unwrap();

        let result = f.service.upload(ada, album.id, png(4, 3)).await.unwrap();
        assert_eq!(result.album_id, album.id);
        assert_eq!(result.uploaded_by, ada);
        assert_eq!(result.image.filename, "beach.png");
        assert_eq!(result.image.content_type, "image/png");
        assert_eq!((result.image.width, result.image.height), (4, 3));
        assert!(result.image.url.ends_with(&format!("/files/{}", result.image.storage_key)));
        assert!(f.blobs.contains(&result.image.storage_key).await);
    }

    #[tokio::test]
    async fn upload_rejects_viewers_and_garbage() {
        let f = fixture();
        let ada = user(&f.store, "ada").await;
        let vic = user(&f.store, "vic").await;
        let album = f
            .store
            .create_album("Trip", &[(ada, AlbumRole::Owner), (vic, AlbumRole::Viewer)])
            .await
            .unwrap();

        let err = f.service.upload(vic, album.id, png(2, 2)).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.message(), UPLOAD_FORBIDDEN);

        let garbage = UploadFile { filename: Some("x.png".into()), bytes: b"nope".to_vec() };
        let err = f.service.upload(ada, album.id, garbage).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(f.blobs.len().await, 0);
    }

    #[tokio::test]
    async fn upload_one_byte_over_the_limit_is_too_large() {
        let f = fixture();
        let ada = user(&f.store, "ada").await;
        let album = f.store.create_album("Trip", &[(ada, AlbumRole::Owner)]).await.unwrap();
        let max = config::config().storage.max_upload_bytes;

        let over = UploadFile { filename: Some("big.png".into()), bytes: vec![0u8; max + 1] };
        let err = f.service.upload(ada, album.id, over).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.to_json()["code"], "PAYLOAD_TOO_LARGE");

        // at the limit the size check passes and decoding rejects the bytes
        let at_limit = UploadFile { filename: Some("big.png".into()), bytes: vec![0u8; max] };
        let err = f.service.upload(ada, album.id, at_limit).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(f.blobs.len().await, 0);
    }

    #[tokio::test]
    async fn unsorted_album_is_created_once() {
        let f = fixture();
        let ada = user(&f.store, "ada").await;

        let first = f.service.upload_unsorted(ada, png(2, 2)).await.unwrap();
        let second = f.service.upload_unsorted(ada, png(2, 2)).await.unwrap();
        assert_eq!(first.album_id, second.album_id);

        let album = f.store.find_album(first.album_id).await.unwrap().unwrap();
        assert_eq!(album.name, UNSORTED_ALBUM);
        assert_eq!(f.store.member_role(album.id, ada).await.unwrap(), Some(AlbumRole::Owner));
    }

    #[tokio::test]
    async fn effects_create_a_derived_image() {
        let f = fixture();
        let ada = user(&f.store, "ada").await;
        let album = f.store.create_album("Trip", &[(ada, AlbumRole::Owner)]).await.unwrap();
        let source = f.service.upload(ada, album.id, png(3, 2)).await.unwrap().image;

        let effects = Effects { invert: true, flip_horizontal: true, ..Default::default() };
        let derived = f.service.apply_effects(ada, source.id, effects, None).await.unwrap();

        assert_eq!(derived.album_id, album.id);
        assert_eq!(derived.image.derived_from, Some(source.id));
        assert_eq!(derived.image.effects, vec!["invert", "flip_horizontal"]);
        assert_eq!(derived.image.filename, "beach_invert_flip_horizontal.png");

        let bytes = f.blobs.get(&derived.image.storage_key).await.unwrap();
        let pixels = image::load_from_memory(&bytes).unwrap().to_rgba8();
        // the white corner pixel is inverted to black and moved to the right edge
        assert_eq!(pixels.get_pixel(2, 0).0, [0, 0, 0, 255]);
        assert_eq!(pixels.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    #[tokio::test]
    async fn effects_require_a_selection_and_upload_rights() {
        let f = fixture();
        let ada = user(&f.store, "ada").await;
        let vic = user(&f.store, "vic").await;
        let album = f
            .store
            .create_album("Trip", &[(ada, AlbumRole::Owner), (vic, AlbumRole::Viewer)])
            .await
            .unwrap();
        let source = f.service.upload(ada, album.id, png(2, 2)).await.unwrap().image;

        let err = f.service.apply_effects(ada, source.id, Effects::default(), None).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let grayscale = Effects { grayscale: true, ..Default::default() };
        let err = f.service.apply_effects(vic, source.id, grayscale, None).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let stranger = user(&f.store, "sam").await;
        let err = f.service.apply_effects(stranger, source.id, grayscale, None).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_is_limited_to_uploader_and_owners() {
        let f = fixture();
        let ada = user(&f.store, "ada").await;
        let bob = user(&f.store, "bob").await;
        let cy = user(&f.store, "cy").await;
        let album = f
            .store
            .create_album(
                "Trip",
                &[(ada, AlbumRole::Owner), (bob, AlbumRole::Member), (cy, AlbumRole::Member)],
            )
            .await
            .unwrap();

        let bobs = f.service.upload(bob, album.id, png(2, 2)).await.unwrap().image;
        let err = f.service.delete_image(cy, bobs.id).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        // album owner may delete anyone's image
        f.service.delete_image(ada, bobs.id).await.unwrap();
        assert!(!f.blobs.contains(&bobs.storage_key).await);
        let err = f.service.get_image(bob, bobs.id).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let own = f.service.upload(cy, album.id, png(2, 2)).await.unwrap().image;
        f.service.delete_image(cy, own.id).await.unwrap();
    }
}
