use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::pagination::{Cursor, Keyset};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Album {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Keyset for Album {
    fn cursor(&self) -> Cursor {
        Cursor::new(self.created_at, self.id)
    }
}

/// Membership role, stored as upper-case text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlbumRole {
    Owner,
    Member,
    Viewer,
}

impl AlbumRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlbumRole::Owner => "OWNER",
            AlbumRole::Member => "MEMBER",
            AlbumRole::Viewer => "VIEWER",
        }
    }
}

impl fmt::Display for AlbumRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlbumRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OWNER" => Ok(AlbumRole::Owner),
            "MEMBER" => Ok(AlbumRole::Member),
            "VIEWER" => Ok(AlbumRole::Viewer),
            other => Err(format!("unknown album role '{}'", other)),
        }
    }
}

/// A membership row joined with the member's username
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumMember {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub role: AlbumRole,
    pub created_at: DateTime<Utc>,
}
