//! Wire shapes returned by the HTTP API and read back by the CLI client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{Album, AlbumMember, AlbumRole, Image, User};

/// Public profile of a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub onboarded: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            avatar_url: user.avatar_url,
            onboarded: user.onboarded,
            created_at: user.created_at,
        }
    }
}

/// Login result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub token: String,
    pub user: UserProfile,
    /// Seconds
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberView {
    pub id: Uuid,
    pub name: String,
    pub role: AlbumRole,
}

impl From<AlbumMember> for MemberView {
    fn from(member: AlbumMember) -> Self {
        Self {
            id: member.user_id,
            name: member.name.unwrap_or_else(|| "Unknown".to_string()),
            role: member.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestImage {
    pub id: Uuid,
    pub url: String,
}

/// One entry of the album list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumSummary {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub latest_image: Option<LatestImage>,
    pub image_count: i64,
    pub latest_image_timestamp: Option<DateTime<Utc>>,
    pub members: Vec<MemberView>,
    pub your_role: AlbumRole,
}

impl AlbumSummary {
    pub fn new(
        album: Album,
        image_count: i64,
        latest: Option<Image>,
        members: Vec<AlbumMember>,
        your_role: AlbumRole,
    ) -> Self {
        Self {
            id: album.id,
            name: album.name,
            created_at: album.created_at,
            latest_image_timestamp: latest.as_ref().map(|image| image.created_at),
            latest_image: latest.map(|image| LatestImage {
                id: image.id,
                url: image.url,
            }),
            image_count,
            members: members.into_iter().map(MemberView::from).collect(),
            your_role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumDetail {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub members: Vec<MemberView>,
    pub your_role: AlbumRole,
}

impl AlbumDetail {
    pub fn new(album: Album, members: Vec<AlbumMember>, your_role: AlbumRole) -> Self {
        Self {
            id: album.id,
            name: album.name,
            created_at: album.created_at,
            members: members.into_iter().map(MemberView::from).collect(),
            your_role,
        }
    }
}

/// An image with the albums the caller can see it in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDetail {
    #[serde(flatten)]
    pub image: Image,
    pub album_ids: Vec<Uuid>,
}

/// Result of an upload or an effects run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResult {
    pub image: Image,
    pub uploaded_by: Uuid,
    pub album_id: Uuid,
}
