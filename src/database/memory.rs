use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{Album, AlbumMember, AlbumRole, Image, NewImage, NewUser, User};
use super::store::{strips_last_owner, AlbumImageStats, Store, LAST_OWNER};
use crate::pagination::PageRequest;

#[derive(Debug, Clone)]
struct MemberRow {
    album_id: Uuid,
    user_id: Uuid,
    role: AlbumRole,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct AlbumImageRow {
    album_id: Uuid,
    image_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    albums: HashMap<Uuid, Album>,
    members: Vec<MemberRow>,
    images: HashMap<Uuid, Image>,
    album_images: Vec<AlbumImageRow>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Tables {
    /// Strictly increasing clock so insertion order is also timestamp order
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn owners_of(&self, album_id: Uuid) -> Vec<Uuid> {
        self.members
            .iter()
            .filter(|m| m.album_id == album_id && m.role == AlbumRole::Owner)
            .map(|m| m.user_id)
            .collect()
    }

    fn role_of(&self, album_id: Uuid, user_id: Uuid) -> Option<AlbumRole> {
        self.members
            .iter()
            .find(|m| m.album_id == album_id && m.user_id == user_id)
            .map(|m| m.role)
    }

    fn name_taken(&self, name: &str, except: Uuid) -> bool {
        self.users
            .values()
            .any(|u| u.id != except && u.name.as_deref() == Some(name))
    }
}

/// In-process store used by tests and by development runs without a database
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, F>(rows: &mut [T], key: F)
where
    F: Fn(&T) -> (DateTime<Utc>, Uuid),
{
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(DatabaseError::Conflict("Email is already registered".to_string()));
        }
        let created_at = tables.now();
        let row = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            name: None,
            avatar_url: None,
            onboarded: false,
            created_at,
        };
        tables.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| tables.users.get(id).cloned()).collect())
    }

    async fn find_users_by_names(&self, names: &[String]) -> Result<Vec<User>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .filter(|u| u.name.as_ref().map_or(false, |n| names.contains(n)))
            .cloned()
            .collect())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        avatar_url: Option<&str>,
    ) -> Result<User, DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.name_taken(name, id) {
            return Err(DatabaseError::Conflict("Username is already taken".to_string()));
        }
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))?;
        user.name = Some(name.to_string());
        user.avatar_url = avatar_url.map(str::to_string);
        user.onboarded = true;
        Ok(user.clone())
    }

    async fn create_album(
        &self,
        name: &str,
        members: &[(Uuid, AlbumRole)],
    ) -> Result<Album, DatabaseError> {
        let mut tables = self.tables.write().await;
        if let Some((missing, _)) = members.iter().find(|(id, _)| !tables.users.contains_key(id)) {
            return Err(DatabaseError::NotFound(format!("User {} not found", missing)));
        }
        let created_at = tables.now();
        let album = Album {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at,
        };
        tables.albums.insert(album.id, album.clone());
        for (user_id, role) in members {
            let created_at = tables.now();
            tables.members.push(MemberRow {
                album_id: album.id,
                user_id: *user_id,
                role: *role,
                created_at,
            });
        }
        Ok(album)
    }

    async fn find_album(&self, id: Uuid) -> Result<Option<Album>, DatabaseError> {
        Ok(self.tables.read().await.albums.get(&id).cloned())
    }

    async fn find_album_by_name(
        &self,
        user_id: Uuid,
        name: &str,
        role: AlbumRole,
    ) -> Result<Option<Album>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut matches: Vec<Album> = tables
            .members
            .iter()
            .filter(|m| m.user_id == user_id && m.role == role)
            .filter_map(|m| tables.albums.get(&m.album_id))
            .filter(|a| a.name == name)
            .cloned()
            .collect();
        // oldest wins, matching the SQL implementation
        matches.sort_by_key(|a| (a.created_at, a.id));
        Ok(matches.into_iter().next())
    }

    async fn rename_album(&self, id: Uuid, name: &str) -> Result<Album, DatabaseError> {
        let mut tables = self.tables.write().await;
        let album = tables
            .albums
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound("Album not found".to_string()))?;
        album.name = name.to_string();
        Ok(album.clone())
    }

    async fn delete_album(&self, id: Uuid) -> Result<Vec<Image>, DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.albums.remove(&id).is_none() {
            return Err(DatabaseError::NotFound("Album not found".to_string()));
        }
        tables.members.retain(|m| m.album_id != id);

        let linked: Vec<Uuid> = tables
            .album_images
            .iter()
            .filter(|l| l.album_id == id)
            .map(|l| l.image_id)
            .collect();
        tables.album_images.retain(|l| l.album_id != id);

        let mut orphans = Vec::new();
        for image_id in linked {
            if !tables.album_images.iter().any(|l| l.image_id == image_id) {
                if let Some(image) = tables.images.remove(&image_id) {
                    orphans.push(image);
                }
            }
        }
        Ok(orphans)
    }

    async fn list_albums_for_user(
        &self,
        user_id: Uuid,
        page: &PageRequest,
    ) -> Result<Vec<Album>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut albums: Vec<Album> = tables
            .members
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| tables.albums.get(&m.album_id).cloned())
            .collect();
        newest_first(&mut albums, |a| (a.created_at, a.id));
        Ok(page.slice(albums))
    }

    async fn member_role(&self, album_id: Uuid, user_id: Uuid) -> Result<Option<AlbumRole>, DatabaseError> {
        Ok(self.tables.read().await.role_of(album_id, user_id))
    }

    async fn list_members(&self, album_id: Uuid) -> Result<Vec<AlbumMember>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut members: Vec<AlbumMember> = tables
            .members
            .iter()
            .filter(|m| m.album_id == album_id)
            .map(|m| AlbumMember {
                user_id: m.user_id,
                name: tables.users.get(&m.user_id).and_then(|u| u.name.clone()),
                role: m.role,
                created_at: m.created_at,
            })
            .collect();
        members.sort_by_key(|m| (m.created_at, m.user_id));
        Ok(members)
    }

    async fn add_members(&self, album_id: Uuid, members: &[(Uuid, AlbumRole)]) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        if !tables.albums.contains_key(&album_id) {
            return Err(DatabaseError::NotFound("Album not found".to_string()));
        }
        for (user_id, role) in members {
            if !tables.users.contains_key(user_id) {
                return Err(DatabaseError::NotFound(format!("User {} not found", user_id)));
            }
            if tables.role_of(album_id, *user_id).is_some() {
                continue;
            }
            let created_at = tables.now();
            tables.members.push(MemberRow {
                album_id,
                user_id: *user_id,
                role: *role,
                created_at,
            });
        }
        Ok(())
    }

    async fn set_member_role(&self, album_id: Uuid, user_id: Uuid, role: AlbumRole) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        if strips_last_owner(&tables.owners_of(album_id), user_id, Some(role)) {
            return Err(DatabaseError::Conflict(LAST_OWNER.to_string()));
        }
        let row = tables
            .members
            .iter_mut()
            .find(|m| m.album_id == album_id && m.user_id == user_id)
            .ok_or_else(|| DatabaseError::NotFound("Member not found".to_string()))?;
        row.role = role;
        Ok(())
    }

    async fn remove_member(&self, album_id: Uuid, user_id: Uuid) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        if strips_last_owner(&tables.owners_of(album_id), user_id, None) {
            return Err(DatabaseError::Conflict(LAST_OWNER.to_string()));
        }
        let before = tables.members.len();
        tables
            .members
            .retain(|m| !(m.album_id == album_id && m.user_id == user_id));
        if tables.members.len() == before {
            return Err(DatabaseError::NotFound("Member not found".to_string()));
        }
        Ok(())
    }

    async fn insert_image(&self, image: NewImage, album_id: Uuid) -> Result<Image, DatabaseError> {
        let mut tables = self.tables.write().await;
        if !tables.albums.contains_key(&album_id) {
            return Err(DatabaseError::NotFound("Album not found".to_string()));
        }
        if !tables.users.contains_key(&image.user_id) {
            return Err(DatabaseError::NotFound("User not found".to_string()));
        }
        if tables.images.contains_key(&image.id) {
            return Err(DatabaseError::Conflict("Image already exists".to_string()));
        }
        let created_at = tables.now();
        let row = Image {
            id: image.id,
            user_id: image.user_id,
            url: image.url,
            storage_key: image.storage_key,
            filename: image.filename,
            content_type: image.content_type,
            size_bytes: image.size_bytes,
            width: image.width,
            height: image.height,
            derived_from: image.derived_from,
            effects: image.effects,
            created_at,
        };
        tables.images.insert(row.id, row.clone());
        tables.album_images.push(AlbumImageRow {
            album_id,
            image_id: row.id,
            created_at,
        });
        Ok(row)
    }

    async fn find_image(&self, id: Uuid) -> Result<Option<Image>, DatabaseError> {
        Ok(self.tables.read().await.images.get(&id).cloned())
    }

    async fn image_albums(&self, image_id: Uuid) -> Result<Vec<Uuid>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut links: Vec<&AlbumImageRow> = tables
            .album_images
            .iter()
            .filter(|l| l.image_id == image_id)
            .collect();
        links.sort_by_key(|l| l.created_at);
        Ok(links.into_iter().map(|l| l.album_id).collect())
    }

    async fn list_album_images(
        &self,
        album_id: Uuid,
        page: &PageRequest,
    ) -> Result<Vec<Image>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut images: Vec<Image> = tables
            .album_images
            .iter()
            .filter(|l| l.album_id == album_id)
            .filter_map(|l| tables.images.get(&l.image_id).cloned())
            .collect();
        newest_first(&mut images, |i| (i.created_at, i.id));
        Ok(page.slice(images))
    }

    async fn album_image_stats(&self, album_id: Uuid) -> Result<AlbumImageStats, DatabaseError> {
        let tables = self.tables.read().await;
        let images: Vec<&Image> = tables
            .album_images
            .iter()
            .filter(|l| l.album_id == album_id)
            .filter_map(|l| tables.images.get(&l.image_id))
            .collect();
        let latest = images
            .iter()
            .max_by_key(|i| (i.created_at, i.id))
            .map(|i| (*i).clone());
        Ok(AlbumImageStats {
            count: images.len() as i64,
            latest,
        })
    }

    async fn delete_image(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.images.remove(&id).is_none() {
            return Err(DatabaseError::NotFound("Image not found".to_string()));
        }
        tables.album_images.retain(|l| l.image_id != id);
        Ok(())
    }
}
