use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::{self, ALBUM_NOT_FOUND};
use crate::api::format::{AlbumDetail, AlbumSummary, MemberView};
use crate::database::models::{Album, AlbumRole, Image};
use crate::database::Store;
use crate::error::ApiError;
use crate::pagination::{Page, PageRequest};
use crate::storage::BlobStore;

pub const MAX_ALBUM_NAME_LEN: usize = 100;

/// Albums and their memberships
pub struct AlbumService {
    store: Arc<dyn Store>,
    blobs: Arc<dyn BlobStore>,
}

impl AlbumService {
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    /// Create an album owned by `creator`; everyone in `user_ids` joins as MEMBER.
    pub async fn create_album(
        &self,
        creator: Uuid,
        name: &str,
        user_ids: &[Uuid],
    ) -> Result<Album, ApiError> {
        let name = validate_album_name(name)?;

        let mut seen = HashSet::from([creator]);
        let others: Vec<Uuid> = user_ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        if !others.is_empty() {
            let found: HashSet<Uuid> = self
                .store
                .find_users_by_ids(&others)
                .await?
                .into_iter()
                .map(|user| user.id)
                .collect();
            let unknown: Vec<String> = others
                .iter()
                .filter(|id| !found.contains(id))
                .map(Uuid::to_string)
                .collect();
            if !unknown.is_empty() {
                return Err(ApiError::field_error(
                    "user_ids",
                    format!("Unknown users: {}", unknown.join(", ")),
                ));
            }
        }

        let members: Vec<(Uuid, AlbumRole)> = std::iter::once((creator, AlbumRole::Owner))
            .chain(others.into_iter().map(|id| (id, AlbumRole::Member)))
            .collect();

        let album = self.store.create_album(name, &members).await?;
        info!("User {} created album {} with {} members", creator, album.id, members.len());
        Ok(album)
    }

    pub async fn list_albums(
        &self,
        user_id: Uuid,
        page: &PageRequest,
    ) -> Result<Page<AlbumSummary>, ApiError> {
        let rows = self.store.list_albums_for_user(user_id, page).await?;
        let page = Page::from_rows(rows, page);

        let mut items = Vec::with_capacity(page.items.len());
        for album in page.items {
            let stats = self.store.album_image_stats(album.id).await?;
            let members = self.store.list_members(album.id).await?;
            let your_role = members
                .iter()
                .find(|m| m.user_id == user_id)
                .map(|m| m.role)
                .ok_or_else(|| ApiError::not_found(ALBUM_NOT_FOUND))?;
            items.push(AlbumSummary::new(album, stats.count, stats.latest, members, your_role));
        }

        Ok(Page {
            items,
            next_cursor: page.next_cursor,
            has_more: page.has_more,
        })
    }

    pub async fn get_album(&self, user_id: Uuid, album_id: Uuid) -> Result<AlbumDetail, ApiError> {
        let role = access::require_member(self.store.as_ref(), album_id, user_id).await?;
        let album = self.find(album_id).await?;
        let members = self.store.list_members(album_id).await?;
        Ok(AlbumDetail::new(album, members, role))
    }

    pub async fn rename_album(&self, user_id: Uuid, album_id: Uuid, name: &str) -> Result<Album, ApiError> {
        access::require_owner(self.store.as_ref(), album_id, user_id).await?;
        let name = validate_album_name(name)?;
        Ok(self.store.rename_album(album_id, name).await?)
    }

    /// Delete the album. Images left in no album go with it, blobs included.
    pub async fn delete_album(&self, user_id: Uuid, album_id: Uuid) -> Result<(), ApiError> {
        access::require_owner(self.store.as_ref(), album_id, user_id).await?;
        let orphans = self.store.delete_album(album_id).await?;
        info!("User {} deleted album {} ({} orphaned images)", user_id, album_id, orphans.len());
        self.delete_blobs(&orphans).await;
        Ok(())
    }

    async fn delete_blobs(&self, images: &[Image]) {
        for image in images {
            if let Err(e) = self.blobs.delete(&image.storage_key).await {
                warn!("Failed to delete blob {} of image {}: {}", image.storage_key, image.id, e);
            }
        }
    }

    /// Add users by username. Existing members are left alone.
    pub async fn invite_members(
        &self,
        user_id: Uuid,
        album_id: Uuid,
        names: &[String],
    ) -> Result<Vec<MemberView>, ApiError> {
        access::require_owner(self.store.as_ref(), album_id, user_id).await?;

        let mut seen = HashSet::new();
        let names: Vec<String> = names
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty() && seen.insert(name.to_string()))
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return Err(ApiError::field_error("names", "At least one username is required"));
        }

        let users = self.store.find_users_by_names(&names).await?;
        let by_name: HashMap<&str, Uuid> = users
            .iter()
            .filter_map(|user| user.name.as_deref().map(|name| (name, user.id)))
            .collect();

        let unknown: HashMap<String, String> = names
            .iter()
            .filter(|name| !by_name.contains_key(name.as_str()))
            .map(|name| (name.clone(), "User not found".to_string()))
            .collect();
        if !unknown.is_empty() {
            return Err(ApiError::validation_error("Some usernames do not exist", Some(unknown)));
        }

        let existing: HashSet<Uuid> = self
            .store
            .list_members(album_id)
            .await?
            .into_iter()
            .map(|m| m.user_id)
            .collect();
        let added: Vec<(Uuid, AlbumRole)> = names
            .iter()
            .filter_map(|name| by_name.get(name.as_str()).copied())
            .filter(|id| !existing.contains(id))
            .map(|id| (id, AlbumRole::Member))
            .collect();

        if !added.is_empty() {
            self.store.add_members(album_id, &added).await?;
            info!("Added {} members to album {}", added.len(), album_id);
        }

        let added_ids: HashSet<Uuid> = added.iter().map(|(id, _)| *id).collect();
        Ok(self
            .store
            .list_members(album_id)
            .await?
            .into_iter()
            .filter(|m| added_ids.contains(&m.user_id))
            .map(MemberView::from)
            .collect())
    }

    pub async fn update_member_role(
        &self,
        user_id: Uuid,
        album_id: Uuid,
        target: Uuid,
        role: AlbumRole,
    ) -> Result<MemberView, ApiError> {
        access::require_owner(self.store.as_ref(), album_id, user_id).await?;
        self.target_role(album_id, target).await?;
        self.store.set_member_role(album_id, target, role).await?;
        self.store
            .list_members(album_id)
            .await?
            .into_iter()
            .find(|m| m.user_id == target)
            .map(MemberView::from)
            .ok_or_else(|| ApiError::not_found("Member not found"))
    }

    /// Owners remove anyone; members may remove themselves.
    pub async fn remove_member(&self, user_id: Uuid, album_id: Uuid, target: Uuid) -> Result<(), ApiError> {
        let role = access::require_member(self.store.as_ref(), album_id, user_id).await?;
        if target != user_id && !role.can_manage() {
            return Err(ApiError::forbidden(access::OWNER_REQUIRED));
        }

        self.target_role(album_id, target).await?;
        self.store.remove_member(album_id, target).await?;
        info!("User {} removed {} from album {}", user_id, target, album_id);
        Ok(())
    }

    pub async fn list_album_images(
        &self,
        user_id: Uuid,
        album_id: Uuid,
        page: &PageRequest,
    ) -> Result<Page<Image>, ApiError> {
        access::require_member(self.store.as_ref(), album_id, user_id).await?;
        let rows = self.store.list_album_images(album_id, page).await?;
        Ok(Page::from_rows(rows, page))
    }

    async fn find(&self, album_id: Uuid) -> Result<Album, ApiError> {
        self.store
            .find_album(album_id)
            .await?
            .ok_or_else(|| ApiError::not_found(ALBUM_NOT_FOUND))
    }

    async fn target_role(&self, album_id: Uuid, target: Uuid) -> Result<AlbumRole, ApiError> {
        self.store
            .member_role(album_id, target)
            .await?
            .ok_or_else(|| ApiError::not_found("Member not found"))
    }
}

fn validate_album_name(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::field_error("name", "Album name is required"));
    }
    if name.chars().count() > MAX_ALBUM_NAME_LEN {
        return Err(ApiError::field_error(
            "name",
            format!("Album name must be at most {} characters", MAX_ALBUM_NAME_LEN),
        ));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewUser;
    use crate::database::MemoryStore;
    use crate::storage::MemoryBlobStore;
    use axum::http::StatusCode;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: AlbumService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::default());
        let service = AlbumService::new(store.clone(), Arc::new(MemoryBlobStore::new()));
        Fixture { store, service }
    }

    async fn user(store: &MemoryStore, name: &str) -> Uuid {
        let user = store
            .insert_user(NewUser {
                email: format!("{}@example.com", name),
                password_hash: "x".into(),
            })
            .await
            .unwrap();
        store.update_profile(user.id, name, None).await.unwrap();
        user.id
    }

    #[tokio::test]
    async fn create_album_dedups_members_and_makes_creator_owner() {
        let f = fixture();
        let ada = user(&f.store, "ada").await;
        let bob = user(&f.store, "bob").await;

        let album = f.service.create_album(ada, "  Summer  ", &[bob, bob, ada]).await.unwrap();
        assert_eq!(album.name, "Summer");

        let members = f.store.list_members(album.id).await.unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(f.store.member_role(album.id, ada).await.unwrap(), Some(AlbumRole::Owner));
        assert_eq!(f.store.member_role(album.id, bob).await.unwrap(), Some(AlbumRole::Member));
    }

    #[tokio::test]
    async fn create_album_rejects_unknown_users_and_bad_names() {
        let f = fixture();
        let ada = user(&f.store, "ada").await;

        let err = f.service.create_album(ada, "Trip", &[Uuid::new_v4()]).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_json()["field_errors"]["user_ids"].is_string());

        assert!(f.service.create_album(ada, "   ", &[]).await.is_err());
        assert!(f.service.create_album(ada, &"x".repeat(101), &[]).await.is_err());
        assert!(f.service.create_album(ada, &"x".repeat(100), &[]).await.is_ok());
    }

    #[tokio::test]
    async fn invite_skips_existing_and_reports_unknown_names() {
        let f = fixture();
        let ada = user(&f.store, "ada").await;
        let bob = user(&f.store, "bob").await;
        user(&f.store, "cy").await;
        let album = f.service.create_album(ada, "Trip", &[bob]).await.unwrap();

        let names = vec![" cy ".to_string(), "bob".into(), "cy".into(), "".into()];
        let added = f.service.invite_members(ada, album.id, &names).await.unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].name, "cy");
        assert_eq!(added[0].role, AlbumRole::Member);

        let err = f
            .service
            .invite_members(ada, album.id, &["ghost".to_string(), "bob".into()])
            .await
            .unwrap_err();
        assert_eq!(err.to_json()["field_errors"]["ghost"], "User not found");

        let err = f.service.invite_members(ada, album.id, &["  ".to_string()]).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = f.service.invite_members(bob, album.id, &["cy".to_string()]).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn members_can_leave_but_not_remove_others() {
        let f = fixture();
        let ada = user(&f.store, "ada").await;
        let bob = user(&f.store, "bob").await;
        let cy = user(&f.store, "cy").await;
        let album = f.service.create_album(ada, "Trip", &[bob, cy]).await.unwrap();

        let err = f.service.remove_member(bob, album.id, cy).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        f.service.remove_member(bob, album.id, bob).await.unwrap();
        let err = f.service.get_album(bob, album.id).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = f.service.remove_member(ada, album.id, ada).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn role_changes_keep_an_owner() {
        let f = fixture();
        let ada = user(&f.store, "ada").await;
        let bob = user(&f.store, "bob").await;
        let album = f.service.create_album(ada, "Trip", &[bob]).await.unwrap();

        let err = f
            .service
            .update_member_role(ada, album.id, ada, AlbumRole::Viewer)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let view = f.service.update_member_role(ada, album.id, bob, AlbumRole::Owner).await.unwrap();
        assert_eq!(view.role, AlbumRole::Owner);
        f.service.update_member_role(bob, album.id, ada, AlbumRole::Viewer).await.unwrap();

        let err = f
            .service
            .update_member_role(bob, album.id, Uuid::new_v4(), AlbumRole::Member)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn only_owners_rename_and_delete() {
        let f = fixture();
        let ada = user(&f.store, "ada").await;
        let bob = user(&f.store, "bob").await;
        let album = f.service.create_album(ada, "Trip", &[bob]).await.unwrap();

        let err = f.service.rename_album(bob, album.id, "Mine").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        let renamed = f.service.rename_album(ada, album.id, " Road trip ").await.unwrap();
        assert_eq!(renamed.name, "Road trip");

        assert!(f.service.delete_album(bob, album.id).await.is_err());
        f.service.delete_album(ada, album.id).await.unwrap();
        assert!(f.store.find_album(album.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_albums_summarizes_each_album() {
        let f = fixture();
        let ada = user(&f.store, "ada").await;
        for i in 0..3 {
            f.service.create_album(ada, &format!("Album {}", i), &[]).await.unwrap();
        }

        let page = f.service.list_albums(ada, &PageRequest::first(2)).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.has_more, Some(true));
        assert_eq!(page.items[0].name, "Album 2");
        assert_eq!(page.items[0].your_role, AlbumRole::Owner);
        assert_eq!(page.items[0].image_count, 0);
        assert!(page.items[0].latest_image.is_none());
    }

    #[tokio::test]
    async fn owners_demoting_each_other_leave_one_owner() {
        let f = fixture();
        let ada = user(&f.store, "ada").await;
        let bob = user(&f.store, "bob").await;
        let album = f.service.create_album(ada, "Trip", &[bob]).await.unwrap();
        f.service.update_member_role(ada, album.id, bob, AlbumRole::Owner).await.unwrap();

        let (by_ada, by_bob) = tokio::join!(
            f.service.update_member_role(ada, album.id, bob, AlbumRole::Member),
            f.service.update_member_role(bob, album.id, ada, AlbumRole::Member),
        );
        assert_eq!(by_ada.is_ok() as u8 + by_bob.is_ok() as u8, 1);
        let err = by_ada.err().or(by_bob.err()).unwrap();
        assert!(matches!(err.status_code(), StatusCode::CONFLICT | StatusCode::FORBIDDEN));

        let owners = f
            .store
            .list_members(album.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.role == AlbumRole::Owner)
            .count();
        assert_eq!(owners, 1);
    }

    #[tokio::test]
    async fn sole_owner_cannot_leave() {
        let f = fixture();
        let ada = user(&f.store, "ada").await;
        let bob = user(&f.store, "bob").await;
        let album = f.service.create_album(ada, "Trip", &[bob]).await.unwrap();

        let err = f.service.remove_member(ada, album.id, ada).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        let err = f
            .service
            .update_member_role(ada, album.id, ada, AlbumRole::Viewer)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.message(), crate::database::LAST_OWNER);
    }
}
