use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::pagination::{Cursor, Keyset};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Image {
    pub id: Uuid,
    /// Uploader
    pub user_id: Uuid,
    pub url: String,
    #[serde(skip_serializing, default)]
    pub storage_key: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub width: i32,
    pub height: i32,
    pub derived_from: Option<Uuid>,
    pub effects: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Keyset for Image {
    fn cursor(&self) -> Cursor {
        Cursor::new(self.created_at, self.id)
    }
}

#[derive(Debug, Clone)]
pub struct NewImage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    pub storage_key: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub width: i32,
    pub height: i32,
    pub derived_from: Option<Uuid>,
    pub effects: Vec<String>,
}
