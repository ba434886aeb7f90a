use async_trait::async_trait;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{Album, AlbumMember, AlbumRole, Image, NewImage, NewUser, User};
use crate::pagination::PageRequest;

pub const LAST_OWNER: &str = "An album must keep at least one owner";

/// True when giving `target` the role `new_role` (`None` removes the
/// membership) would leave `owners` empty.
pub fn strips_last_owner(owners: &[Uuid], target: Uuid, new_role: Option<AlbumRole>) -> bool {
    new_role != Some(AlbumRole::Owner) && owners.contains(&target) && owners.iter().all(|owner| *owner == target)
}

/// Image count and newest image of an album
#[derive(Debug, Clone, Default)]
pub struct AlbumImageStats {
    pub count: i64,
    pub latest: Option<Image>,
}

/// Data access for users, albums, memberships and images.
///
/// List methods return at most `page.fetch_limit()` rows, newest first.
#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> Result<(), DatabaseError>;

    // Users
    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;
    async fn find_users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, DatabaseError>;
    async fn find_users_by_names(&self, names: &[String]) -> Result<Vec<User>, DatabaseError>;
    async fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        avatar_url: Option<&str>,
    ) -> Result<User, DatabaseError>;

    // Albums
    /// Inserts the album and its membership rows atomically
    async fn create_album(
        &self,
        name: &str,
        members: &[(Uuid, AlbumRole)],
    ) -> Result<Album, DatabaseError>;
    async fn find_album(&self, id: Uuid) -> Result<Option<Album>, DatabaseError>;
    /// Album with this name in which the user holds the given role
    async fn find_album_by_name(
        &self,
        user_id: Uuid,
        name: &str,
        role: AlbumRole,
    ) -> Result<Option<Album>, DatabaseError>;
    async fn rename_album(&self, id: Uuid, name: &str) -> Result<Album, DatabaseError>;
    /// Deletes the album with its memberships and links. Returns the images
    /// that no longer belong to any album and were deleted as well.
    async fn delete_album(&self, id: Uuid) -> Result<Vec<Image>, DatabaseError>;
    async fn list_albums_for_user(
        &self,
        user_id: Uuid,
        page: &PageRequest,
    ) -> Result<Vec<Album>, DatabaseError>;

    // Members
    async fn member_role(&self, album_id: Uuid, user_id: Uuid) -> Result<Option<AlbumRole>, DatabaseError>;
    async fn list_members(&self, album_id: Uuid) -> Result<Vec<AlbumMember>, DatabaseError>;
    /// Adds memberships, skipping users that are already members
    async fn add_members(&self, album_id: Uuid, members: &[(Uuid, AlbumRole)]) -> Result<(), DatabaseError>;
    /// Changes a role. Fails with `Conflict(LAST_OWNER)` instead of demoting
    /// the album's only owner; the check and the write are atomic.
    async fn set_member_role(&self, album_id: Uuid, user_id: Uuid, role: AlbumRole) -> Result<(), DatabaseError>;
    /// Removes a membership, with the same last-owner guard as `set_member_role`
    async fn remove_member(&self, album_id: Uuid, user_id: Uuid) -> Result<(), DatabaseError>;

    // Images
    /// Inserts the image row and links it to the album atomically
    async fn insert_image(&self, image: NewImage, album_id: Uuid) -> Result<Image, DatabaseError>;
    async fn find_image(&self, id: Uuid) -> Result<Option<Image>, DatabaseError>;
    /// Albums containing the image
    async fn image_albums(&self, image_id: Uuid) -> Result<Vec<Uuid>, DatabaseError>;
    async fn list_album_images(
        &self,
        album_id: Uuid,
        page: &PageRequest,
    ) -> Result<Vec<Image>, DatabaseError>;
    async fn album_image_stats(&self, album_id: Uuid) -> Result<AlbumImageStats, DatabaseError>;
    async fn delete_image(&self, id: Uuid) -> Result<(), DatabaseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_sole_owner_is_protected() {
        let (a, b, c) = (Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3));

        assert!(strips_last_owner(&[a], a, None));
        assert!(strips_last_owner(&[a], a, Some(AlbumRole::Member)));
        assert!(!strips_last_owner(&[a], a, Some(AlbumRole::Owner)));
        assert!(!strips_last_owner(&[a, b], a, Some(AlbumRole::Viewer)));
        // non-owners never touch the invariant
        assert!(!strips_last_owner(&[a], c, None));
    }
}
