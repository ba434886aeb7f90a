//! Role checks against a single album membership row.
//!
//! A user without a membership row gets 404 for the album, so album ids do
//! not leak to non-members. Members with too weak a role get 403.

use uuid::Uuid;

use crate::database::models::AlbumRole;
use crate::database::Store;
use crate::error::ApiError;

pub const ALBUM_NOT_FOUND: &str = "Album not found";
pub const UPLOAD_FORBIDDEN: &str = "User does not have permission to upload to this album.";
pub const OWNER_REQUIRED: &str = "Only album owners can do this";

impl AlbumRole {
    pub fn can_view(self) -> bool {
        true
    }

    pub fn can_upload(self) -> bool {
        matches!(self, AlbumRole::Owner | AlbumRole::Member)
    }

    pub fn can_manage(self) -> bool {
        matches!(self, AlbumRole::Owner)
    }
}

/// Load the caller's role and check it with `allowed`.
pub async fn require_role(
    store: &dyn Store,
    album_id: Uuid,
    user_id: Uuid,
    allowed: fn(AlbumRole) -> bool,
    forbidden_message: &str,
) -> Result<AlbumRole, ApiError> {
    let role = store
        .member_role(album_id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found(ALBUM_NOT_FOUND))?;

    if !allowed(role) {
        tracing::debug!("User {} with role {} denied on album {}", user_id, role, album_id);
        return Err(ApiError::forbidden(forbidden_message));
    }
    Ok(role)
}

pub async fn require_member(store: &dyn Store, album_id: Uuid, user_id: Uuid) -> Result<AlbumRole, ApiError> {
    require_role(store, album_id, user_id, AlbumRole::can_view, ALBUM_NOT_FOUND).await
}

pub async fn require_uploader(store: &dyn Store, album_id: Uuid, user_id: Uuid) -> Result<AlbumRole, ApiError> {
    require_role(store, album_id, user_id, AlbumRole::can_upload, UPLOAD_FORBIDDEN).await
}

pub async fn require_owner(store: &dyn Store, album_id: Uuid, user_id: Uuid) -> Result<AlbumRole, ApiError> {
    require_role(store, album_id, user_id, AlbumRole::can_manage, OWNER_REQUIRED).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewUser;
    use crate::database::MemoryStore;
    use axum::http::StatusCode;

    async fn user(store: &MemoryStore, email: &str) -> Uuid {
        store
            .insert_user(NewUser {
                email: email.to_string(),
                password_hash: "x".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    #[test]
    fn role_capabilities() {
        assert!(AlbumRole::Viewer.can_view());
        assert!(!AlbumRole::Viewer.can_upload());
        assert!(AlbumRole::Member.can_upload());
        assert!(!AlbumRole::Member.can_manage());
        assert!(AlbumRole::Owner.can_manage());
    }

    #[tokio::test]
    async fn non_members_see_not_found() {
        let store = MemoryStore::default();
        let owner = user(&store, "o@x.io").await;
        let stranger = user(&store, "s@x.io").await;
        let album = store.create_album("Trip", &[(owner, AlbumRole::Owner)]).await.unwrap();

        let err = require_member(&store, album.id, stranger).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), ALBUM_NOT_FOUND);
    }

    #[tokio::test]
    async fn viewers_cannot_upload() {
        let store = MemoryStore::default();
        let owner = user(&store, "o@x.io").await;
        let viewer = user(&store, "v@x.io").await;
        let album = store
            .create_album("Trip", &[(owner, AlbumRole::Owner), (viewer, AlbumRole::Viewer)])
            .await
            .unwrap();

        let err = require_uploader(&store, album.id, viewer).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.message(), UPLOAD_FORBIDDEN);
        assert_eq!(require_uploader(&store, album.id, owner).await.unwrap(), AlbumRole::Owner);
    }
}
